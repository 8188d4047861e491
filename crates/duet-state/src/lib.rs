//! Lifecycle state for the supervisor and the services it owns.
//!
//! [`SupervisorPhase`] is the startup/shutdown state machine of the whole
//! supervisor; [`PhaseMachine`] validates its transitions and keeps a
//! timestamped history. [`ServiceLifecycle`] tracks a single service handle.

use chrono::{DateTime, Utc};
use duet_common::{LaunchError, LaunchResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phases of a supervisor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorPhase {
    Idle,
    BackendStarting,
    BackendReady,
    BackendFailed,
    FrontendStarting,
    FrontendReady,
    FrontendFailed,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorPhase::Idle => "idle",
            SupervisorPhase::BackendStarting => "backend_starting",
            SupervisorPhase::BackendReady => "backend_ready",
            SupervisorPhase::BackendFailed => "backend_failed",
            SupervisorPhase::FrontendStarting => "frontend_starting",
            SupervisorPhase::FrontendReady => "frontend_ready",
            SupervisorPhase::FrontendFailed => "frontend_failed",
            SupervisorPhase::Running => "running",
            SupervisorPhase::ShuttingDown => "shutting_down",
            SupervisorPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

impl SupervisorPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorPhase::Stopped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            SupervisorPhase::BackendFailed | SupervisorPhase::FrontendFailed
        )
    }
}

/// A recorded phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: SupervisorPhase,
    pub to: SupervisorPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Validating state machine over [`SupervisorPhase`].
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: SupervisorPhase,
    history: Vec<PhaseTransition>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            current: SupervisorPhase::Idle,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> SupervisorPhase {
        self.current
    }

    pub fn history(&self) -> &[PhaseTransition] {
        &self.history
    }

    /// When the machine last entered `phase`, if ever.
    pub fn entered_at(&self, phase: SupervisorPhase) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|t| t.to == phase)
            .map(|t| t.timestamp)
    }

    pub fn is_valid_transition(&self, target: SupervisorPhase) -> bool {
        use SupervisorPhase::*;

        match (self.current, target) {
            (Idle, BackendStarting) => true,

            (BackendStarting, BackendReady) => true,
            (BackendStarting, BackendFailed) => true,
            (BackendReady, FrontendStarting) => true,

            (FrontendStarting, FrontendReady) => true,
            (FrontendStarting, FrontendFailed) => true,
            (FrontendReady, Running) => true,

            // Failure, interrupt or exit: every live phase can wind down.
            (ShuttingDown, Stopped) => true,
            (Stopped, _) => false,
            (ShuttingDown, _) => false,
            (_, ShuttingDown) => true,

            _ => false,
        }
    }

    /// Transition to `target`, recording it in the history.
    pub fn transition_to(&mut self, target: SupervisorPhase, reason: Option<String>) -> LaunchResult<()> {
        if !self.is_valid_transition(target) {
            return Err(LaunchError::InvalidTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }

        let transition = PhaseTransition {
            from: self.current,
            to: target,
            timestamp: Utc::now(),
            reason,
        };

        tracing::debug!("Supervisor phase {} -> {}", transition.from, transition.to);

        self.current = target;
        self.history.push(transition);
        Ok(())
    }
}

/// Lifecycle of a single started service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceLifecycle {
    /// Spawned, readiness not yet confirmed.
    Starting,
    /// Answered its readiness probe.
    Ready,
    /// Termination in progress.
    Stopping,
    /// Terminated by the supervisor.
    Stopped,
    /// Exited on its own.
    Exited,
}

impl ServiceLifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceLifecycle::Stopped | ServiceLifecycle::Exited)
    }
}

impl fmt::Display for ServiceLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceLifecycle::Starting => write!(f, "starting"),
            ServiceLifecycle::Ready => write!(f, "ready"),
            ServiceLifecycle::Stopping => write!(f, "stopping"),
            ServiceLifecycle::Stopped => write!(f, "stopped"),
            ServiceLifecycle::Exited => write!(f, "exited"),
        }
    }
}

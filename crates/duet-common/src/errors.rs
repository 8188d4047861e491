//! Error types for the duet supervisor.
//!
//! Every fallible startup step returns a [`LaunchError`]. Steps add context
//! as the error travels up, so the final diagnostic names both the step that
//! failed and the underlying cause:
//!
//! ```
//! use duet_common::{LaunchError, LaunchResult, ResultExt};
//!
//! fn allocate() -> LaunchResult<u16> {
//!     Err(LaunchError::PortExhausted { first: 11434, last: 11443 })
//! }
//!
//! let err = allocate().context("allocating backend port").unwrap_err();
//! assert!(err.to_string().starts_with("allocating backend port"));
//! assert!(matches!(err.root(), LaunchError::PortExhausted { .. }));
//! ```

use crate::types::ServiceRole;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for supervisor operations.
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Main error type for supervisor operations.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No port in the probed range could be bound.
    #[error("No free port in range {first}..={last}")]
    PortExhausted { first: u16, last: u16 },

    /// The service executable does not exist.
    #[error("{role} executable not found: {}", path.display())]
    BinaryNotFound { role: ServiceRole, path: PathBuf },

    /// The OS refused to spawn the process.
    #[error("{role} launch failed: {reason}")]
    LaunchFailed { role: ServiceRole, reason: String },

    /// The readiness endpoint never answered with an accepted status.
    #[error("{role} not ready at {url} after {timeout:?} (last failure: {last_failure})")]
    ReadinessTimedOut {
        role: ServiceRole,
        url: String,
        timeout: Duration,
        last_failure: String,
    },

    /// The process exited while the supervisor was waiting for it to come up.
    #[error("{role} process exited during startup (exit code {})", describe_exit_code(*exit_code))]
    ProcessCrashedDuringStartup {
        role: ServiceRole,
        exit_code: Option<i32>,
    },

    /// A teardown step failed. Logged, never propagated past shutdown.
    #[error("{role} shutdown step failed: {reason}")]
    ShutdownStepFailed { role: ServiceRole, reason: String },

    /// The supervisor attempted a phase transition its state machine forbids.
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Invalid configuration or environment.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another error with the step that produced it.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        source: Box<LaunchError>,
    },
}

fn describe_exit_code(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none, terminated by signal".to_string(),
    }
}

impl LaunchError {
    pub fn binary_not_found(role: ServiceRole, path: impl Into<PathBuf>) -> Self {
        Self::BinaryNotFound {
            role,
            path: path.into(),
        }
    }

    pub fn launch_failed(role: ServiceRole, reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            role,
            reason: reason.into(),
        }
    }

    pub fn crashed(role: ServiceRole, exit_code: Option<i32>) -> Self {
        Self::ProcessCrashedDuringStartup { role, exit_code }
    }

    pub fn shutdown_step_failed(role: ServiceRole, reason: impl Into<String>) -> Self {
        Self::ShutdownStepFailed {
            role,
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Wraps the error with the step that produced it.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &LaunchError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Adds context to error results.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> LaunchResult<T>;
}

impl<T> ResultExt<T> for LaunchResult<T> {
    fn context(self, message: impl Into<String>) -> LaunchResult<T> {
        self.map_err(|e| e.context(message))
    }
}

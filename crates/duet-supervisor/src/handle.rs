//! Runtime handle to a started service.

use chrono::{DateTime, Utc};
use duet_common::{LaunchError, LaunchResult, ServiceRole};
use duet_monitoring::{Liveness, LivenessProbe};
use duet_process::{force_kill, process_exists, terminate_gracefully};
use duet_state::ServiceLifecycle;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How long a force-killed process gets to disappear.
pub const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(3);

/// A started service process. Owned by the supervisor; the launcher that
/// created it keeps no reference.
#[derive(Debug)]
pub struct ServiceHandle {
    role: ServiceRole,
    child: Child,
    pid: Option<u32>,
    port: u16,
    started_at: DateTime<Utc>,
    ready_at: Option<DateTime<Utc>>,
    lifecycle: ServiceLifecycle,
    exit_code: Option<i32>,
}

impl ServiceHandle {
    pub fn new(role: ServiceRole, child: Child, port: u16) -> Self {
        let pid = child.id();
        Self {
            role,
            child,
            pid,
            port,
            started_at: Utc::now(),
            ready_at: None,
            lifecycle: ServiceLifecycle::Starting,
            exit_code: None,
        }
    }

    pub fn role(&self) -> ServiceRole {
        self.role
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ready_at(&self) -> Option<DateTime<Utc>> {
        self.ready_at
    }

    pub fn lifecycle(&self) -> ServiceLifecycle {
        self.lifecycle
    }

    /// Exit code once the process has exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn mark_ready(&mut self) {
        if self.lifecycle == ServiceLifecycle::Starting {
            self.ready_at = Some(Utc::now());
            self.lifecycle = ServiceLifecycle::Ready;
        }
    }

    /// Non-blocking exit check. `Some(code)` once the process has exited,
    /// with `code` `None` when it was killed by a signal.
    pub fn poll_exit(&mut self) -> Option<Option<i32>> {
        if self.lifecycle.is_terminal() {
            return Some(self.exit_code);
        }

        match self.child.try_wait() {
            Ok(Some(status)) => Some(self.record_exit(status)),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to poll {} (PID {:?}): {}", self.role, self.pid, e);
                None
            }
        }
    }

    /// Wait for the process to exit on its own.
    pub async fn wait(&mut self) -> io::Result<Option<i32>> {
        if self.lifecycle.is_terminal() {
            return Ok(self.exit_code);
        }

        let status = self.child.wait().await?;
        Ok(self.record_exit(status))
    }

    fn record_exit(&mut self, status: ExitStatus) -> Option<i32> {
        if self.lifecycle != ServiceLifecycle::Stopping {
            self.lifecycle = ServiceLifecycle::Exited;
        }
        self.exit_code = status.code();
        debug!("{} (PID {:?}) exited: {}", self.role, self.pid, status);
        self.exit_code
    }

    /// Stop the process: graceful signal, wait up to `graceful_timeout`, then
    /// force kill and wait up to [`FORCE_KILL_TIMEOUT`].
    ///
    /// Returns immediately for a process that already exited or was already
    /// stopped, so calling this twice never signals twice.
    pub async fn terminate(&mut self, graceful_timeout: Duration) -> LaunchResult<()> {
        if self.poll_exit().is_some() {
            debug!("{} already exited, nothing to stop", self.role);
            return Ok(());
        }

        let Some(pid) = self.pid else {
            self.lifecycle = ServiceLifecycle::Stopped;
            return Ok(());
        };

        self.lifecycle = ServiceLifecycle::Stopping;
        info!("Stopping {} (PID {})", self.role, pid);

        if let Err(e) = terminate_gracefully(pid) {
            warn!("Failed to send termination signal to {} (PID {}): {}", self.role, pid, e);
        }

        if self.wait_for_exit_confirmed(pid, graceful_timeout).await? {
            info!("{} stopped gracefully", self.role);
            return Ok(());
        }

        warn!(
            "{} (PID {}) did not exit within {:?}, force killing",
            self.role, pid, graceful_timeout
        );
        if let Err(e) = force_kill(pid) {
            warn!("Force kill failed for {} (PID {}): {}", self.role, pid, e);
        }

        if self.wait_for_exit_confirmed(pid, FORCE_KILL_TIMEOUT).await? {
            info!("{} stopped after force kill", self.role);
            return Ok(());
        }

        Err(LaunchError::shutdown_step_failed(
            self.role,
            format!(
                "PID {} still running after graceful timeout {:?} + force-kill timeout {:?}",
                pid, graceful_timeout, FORCE_KILL_TIMEOUT
            ),
        ))
    }

    /// `Ok(true)` once the child is reaped within `limit`.
    async fn wait_for_exit_confirmed(&mut self, pid: u32, limit: Duration) -> LaunchResult<bool> {
        match timeout(limit, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit_code = status.code();
                self.lifecycle = ServiceLifecycle::Stopped;
                Ok(true)
            }
            Ok(Err(e)) => {
                // Could not reap; fall back to asking the OS.
                warn!("Failed to wait for {} (PID {}): {}", self.role, pid, e);
                match process_exists(pid) {
                    Ok(true) => Ok(false),
                    Ok(false) => {
                        self.lifecycle = ServiceLifecycle::Stopped;
                        Ok(true)
                    }
                    Err(e) => Err(LaunchError::shutdown_step_failed(
                        self.role,
                        format!("Failed to confirm exit of PID {}: {}", pid, e),
                    )),
                }
            }
            Err(_) => Ok(false),
        }
    }

    /// Best-effort synchronous kill, for exit paths that cannot await.
    pub fn kill_now(&mut self) {
        if self.lifecycle.is_terminal() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            debug!("Kill of {} on exit failed: {}", self.role, e);
        }
        self.lifecycle = ServiceLifecycle::Stopped;
    }
}

impl LivenessProbe for ServiceHandle {
    fn liveness(&mut self) -> Liveness {
        match self.poll_exit() {
            Some(code) => Liveness::Exited(code),
            None => Liveness::Alive,
        }
    }
}

//! Ordered startup and teardown of the backend/frontend pair.
//!
//! The supervisor owns both service handles. Startup is strictly sequential:
//! the backend must be ready before the frontend is started, because the
//! frontend's environment carries the backend's resolved port. Teardown runs
//! in reverse order and exactly once, whether it is reached through a
//! frontend exit, an interrupt, a startup failure or `Drop`.

use crate::browser;
use crate::config::LauncherConfig;
use crate::env::{backend_base_url, OLLAMA_API_BASE, OLLAMA_BASE_URL};
use crate::handle::ServiceHandle;
use crate::launcher::Launch;
use crate::service::ServiceSpec;
use duet_common::{LaunchError, LaunchResult, ResultExt, ServiceRole};
use duet_monitoring::{wait_ready, ReadinessResult};
use duet_process::find_free_port;
use duet_state::{PhaseMachine, SupervisorPhase};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a supervisor run ended when startup succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The frontend exited on its own with this code.
    FrontendExited(Option<i32>),
    /// Cancelled by an interrupt or termination signal.
    Interrupted,
}

/// Supervisor behaviour that is not part of either service's spec.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub graceful_timeout: Duration,
    pub open_browser: bool,
    pub browser_delay: Duration,
}

impl SupervisorOptions {
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self {
            graceful_timeout: config.graceful_timeout,
            open_browser: config.open_browser,
            browser_delay: config.browser_delay,
        }
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from_config(&LauncherConfig::default())
    }
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// The services a supervisor has started, plus cleanup to run on teardown.
#[derive(Default)]
pub struct SupervisorState {
    backend: Option<ServiceHandle>,
    frontend: Option<ServiceHandle>,
    cleanups: Vec<Cleanup>,
    torn_down: bool,
}

impl std::fmt::Debug for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorState")
            .field("backend", &self.backend)
            .field("frontend", &self.frontend)
            .field("cleanups", &self.cleanups.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl SupervisorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, role: ServiceRole) -> Option<&ServiceHandle> {
        match role {
            ServiceRole::Backend => self.backend.as_ref(),
            ServiceRole::Frontend => self.frontend.as_ref(),
        }
    }

    pub fn handle_mut(&mut self, role: ServiceRole) -> Option<&mut ServiceHandle> {
        match role {
            ServiceRole::Backend => self.backend.as_mut(),
            ServiceRole::Frontend => self.frontend.as_mut(),
        }
    }

    /// Store a freshly started handle. A role holds at most one handle.
    pub fn install(&mut self, handle: ServiceHandle) -> LaunchResult<&mut ServiceHandle> {
        let role = handle.role();
        let slot = match role {
            ServiceRole::Backend => &mut self.backend,
            ServiceRole::Frontend => &mut self.frontend,
        };
        if slot.is_some() {
            return Err(LaunchError::launch_failed(role, "already started"));
        }
        Ok(slot.insert(handle))
    }

    /// Run `cleanup` during teardown, after both services are stopped.
    pub fn on_teardown(&mut self, cleanup: impl FnOnce() + Send + 'static) {
        self.cleanups.push(Box::new(cleanup));
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Stop the frontend, then the backend, then run cleanups.
    ///
    /// Every step is attempted even if an earlier one fails; failures are
    /// logged. A second call does nothing.
    pub async fn teardown(&mut self, graceful_timeout: Duration) {
        if self.torn_down {
            debug!("Teardown already done");
            return;
        }
        self.torn_down = true;

        for role in [ServiceRole::Frontend, ServiceRole::Backend] {
            if let Some(handle) = self.handle_mut(role) {
                if let Err(e) = handle.terminate(graceful_timeout).await {
                    warn!("{}", e);
                }
            }
        }

        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }
}

impl Drop for SupervisorState {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        for role in [ServiceRole::Frontend, ServiceRole::Backend] {
            if let Some(handle) = self.handle_mut(role) {
                handle.kill_now();
            }
        }
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }
}

/// Drives one backend/frontend pair from `Idle` to `Stopped`.
pub struct Supervisor<L: Launch> {
    launcher: L,
    backend: ServiceSpec,
    frontend: ServiceSpec,
    options: SupervisorOptions,
    cancel: CancellationToken,
    phases: PhaseMachine,
    state: SupervisorState,
}

impl<L: Launch> Supervisor<L> {
    pub fn new(
        launcher: L,
        backend: ServiceSpec,
        frontend: ServiceSpec,
        options: SupervisorOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            launcher,
            backend,
            frontend,
            options,
            cancel,
            phases: PhaseMachine::new(),
            state: SupervisorState::new(),
        }
    }

    pub fn phases(&self) -> &PhaseMachine {
        &self.phases
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Start both services, block until the frontend exits or the token is
    /// cancelled, then tear everything down.
    ///
    /// Startup errors are returned after teardown has completed.
    pub async fn run(&mut self) -> LaunchResult<RunOutcome> {
        let cancel = self.cancel.clone();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Interrupted, shutting down");
                Ok(RunOutcome::Interrupted)
            }
            result = self.drive() => result,
        };

        if let Err(ref e) = result {
            error!("Startup failed: {}", e);
        }

        self.shutdown().await;
        result
    }

    /// Tear down whatever was started. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.state.is_torn_down() {
            return;
        }

        self.enter(SupervisorPhase::ShuttingDown, None);
        self.state.teardown(self.options.graceful_timeout).await;
        self.enter(SupervisorPhase::Stopped, None);
    }

    async fn drive(&mut self) -> LaunchResult<RunOutcome> {
        let backend_port = self.start_service(ServiceRole::Backend, &BTreeMap::new()).await?;

        // The frontend reaches the backend through these.
        let base_url = backend_base_url(&self.backend.host, backend_port);
        let mut link = BTreeMap::new();
        link.insert(OLLAMA_API_BASE.to_string(), base_url.clone());
        link.insert(OLLAMA_BASE_URL.to_string(), base_url);

        let frontend_port = self.start_service(ServiceRole::Frontend, &link).await?;

        self.enter(SupervisorPhase::Running, None);
        let url = browser::browser_url(&self.frontend.host, frontend_port);
        info!("duet is running at {}", url);

        if self.options.open_browser {
            let task = browser::spawn_open(url, self.options.browser_delay);
            self.state.on_teardown(move || task.abort());
        }

        let frontend = self
            .state
            .handle_mut(ServiceRole::Frontend)
            .ok_or_else(|| LaunchError::launch_failed(ServiceRole::Frontend, "no frontend handle"))?;
        let code = frontend
            .wait()
            .await
            .map_err(LaunchError::from)
            .context("waiting for frontend")?;

        info!("Frontend exited (code {:?})", code);
        Ok(RunOutcome::FrontendExited(code))
    }

    /// Allocate a port, launch, and wait for readiness. Returns the port.
    async fn start_service(
        &mut self,
        role: ServiceRole,
        extra_env: &BTreeMap<String, String>,
    ) -> LaunchResult<u16> {
        let (starting, ready, failed) = match role {
            ServiceRole::Backend => (
                SupervisorPhase::BackendStarting,
                SupervisorPhase::BackendReady,
                SupervisorPhase::BackendFailed,
            ),
            ServiceRole::Frontend => (
                SupervisorPhase::FrontendStarting,
                SupervisorPhase::FrontendReady,
                SupervisorPhase::FrontendFailed,
            ),
        };

        self.enter(starting, None);
        match self.launch_and_wait(role, extra_env).await {
            Ok(port) => {
                self.enter(ready, None);
                Ok(port)
            }
            Err(e) => {
                self.enter(failed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn launch_and_wait(
        &mut self,
        role: ServiceRole,
        extra_env: &BTreeMap<String, String>,
    ) -> LaunchResult<u16> {
        let spec = match role {
            ServiceRole::Backend => &self.backend,
            ServiceRole::Frontend => &self.frontend,
        };

        let port = find_free_port(spec.preferred_port, spec.port_range)
            .context(format!("allocating {} port", role))?;
        info!("{} port: {}", role, port);

        let handle = match role {
            ServiceRole::Backend => self.launcher.start_backend(spec, port, extra_env),
            ServiceRole::Frontend => self.launcher.start_frontend(spec, port, extra_env),
        }
        .context(format!("starting {}", role))?;

        let handle = self.state.install(handle)?;
        let url = spec.readiness_url_for(port);
        info!("Waiting for {} at {}", role, url);

        match wait_ready(&url, handle, &spec.readiness_options()).await {
            ReadinessResult::Ready => {
                handle.mark_ready();
                info!("{} ready on port {}", role, port);
                Ok(port)
            }
            ReadinessResult::ProcessExited { exit_code } => {
                Err(LaunchError::crashed(role, exit_code)).context(format!("waiting for {}", role))
            }
            ReadinessResult::TimedOut { last_failure } | ReadinessResult::NotYetUp { reason: last_failure } => {
                Err(LaunchError::ReadinessTimedOut {
                    role,
                    url,
                    timeout: spec.readiness_timeout,
                    last_failure,
                })
                .context(format!("waiting for {}", role))
            }
        }
    }

    /// Record a phase change. Invalid transitions are logged, never fatal.
    fn enter(&mut self, phase: SupervisorPhase, reason: Option<String>) {
        match self.phases.transition_to(phase, reason) {
            Ok(()) => info!("Phase: {}", phase),
            Err(e) => warn!("{}", e),
        }
    }
}

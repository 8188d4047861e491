//! Starting service processes.

use crate::handle::ServiceHandle;
use crate::role::SENTINEL;
use crate::service::{EntryPoint, ServiceSpec};
use duet_common::{LaunchError, LaunchResult, ResultExt};
use duet_process::{ensure_executable, spawn_service, validate_executable, ExecutionRequest};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Starts the two services. The supervisor only talks to this trait, so the
/// startup sequence can be driven with stand-in processes.
pub trait Launch {
    /// Start the backend bound to `port`.
    fn start_backend(
        &self,
        spec: &ServiceSpec,
        port: u16,
        extra_env: &BTreeMap<String, String>,
    ) -> LaunchResult<ServiceHandle>;

    /// Start the frontend bound to `port`. `extra_env` carries the values
    /// resolved while starting the backend.
    fn start_frontend(
        &self,
        spec: &ServiceSpec,
        port: u16,
        extra_env: &BTreeMap<String, String>,
    ) -> LaunchResult<ServiceHandle>;
}

/// Launches real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    fn spawn(
        &self,
        spec: &ServiceSpec,
        port: u16,
        extra_env: &BTreeMap<String, String>,
    ) -> LaunchResult<ServiceHandle> {
        let mut request = match &spec.entry {
            EntryPoint::Executable { path, args } => {
                ExecutionRequest::new(spec.role, path).args(args)
            }
            EntryPoint::SelfRelaunch { executable } => {
                ExecutionRequest::new(spec.role, executable).arg(SENTINEL)
            }
        };

        for (key, value) in spec.render_env(port).into_iter().chain(extra_env.clone()) {
            request = request.env(key, value);
        }

        if let Some(ref dir) = spec.working_directory {
            std::fs::create_dir_all(dir)
                .map_err(LaunchError::from)
                .context(format!("creating {} working directory {}", spec.role, dir.display()))?;
            request = request.working_directory(dir);
        }

        debug!("{} environment: {:?}", spec.role, request.environment);

        let child = spawn_service(&request)?;
        let handle = ServiceHandle::new(spec.role, child, port);
        info!("Started {} (PID {:?}) on port {}", spec.role, handle.pid(), port);
        Ok(handle)
    }
}

impl Launch for ProcessLauncher {
    fn start_backend(
        &self,
        spec: &ServiceSpec,
        port: u16,
        extra_env: &BTreeMap<String, String>,
    ) -> LaunchResult<ServiceHandle> {
        if let EntryPoint::Executable { path, .. } = &spec.entry {
            validate_executable(spec.role, path)?;

            // Not fatal: the spawn reports the real problem if there is one.
            match ensure_executable(path) {
                Ok(true) => info!("Marked {} as executable", path.display()),
                Ok(false) => {}
                Err(e) => warn!("Could not mark {} as executable: {}", path.display(), e),
            }
        }

        self.spawn(spec, port, extra_env)
    }

    fn start_frontend(
        &self,
        spec: &ServiceSpec,
        port: u16,
        extra_env: &BTreeMap<String, String>,
    ) -> LaunchResult<ServiceHandle> {
        self.spawn(spec, port, extra_env)
    }
}

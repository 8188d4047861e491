//! Process spawning.

use duet_common::{LaunchError, LaunchResult, ServiceRole};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use tokio::process::{Child, Command};
use tracing::debug;

/// Everything needed to start one service process.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub role: ServiceRole,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_directory: Option<PathBuf>,
    /// Added on top of the inherited environment.
    pub environment: BTreeMap<String, String>,
}

impl ExecutionRequest {
    pub fn new(role: ServiceRole, program: impl Into<PathBuf>) -> Self {
        Self {
            role,
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            environment: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

/// Spawn a service process.
///
/// Standard streams are inherited so the service logs straight to the
/// supervisor's console. The child is killed if its handle is dropped
/// without being reaped.
pub fn spawn_service(request: &ExecutionRequest) -> LaunchResult<Child> {
    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args).envs(&request.environment).kill_on_drop(true);

    if let Some(ref wd) = request.working_directory {
        cmd.current_dir(wd);
    }

    // Own process group, so Ctrl+Break can target the child alone.
    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    debug!(
        "Spawning {}: {} {:?} (cwd: {:?})",
        request.role,
        request.program.display(),
        request.args,
        request.working_directory
    );

    cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LaunchError::binary_not_found(request.role, &request.program),
        _ => LaunchError::launch_failed(
            request.role,
            format!("{}: {}", request.program.display(), e),
        ),
    })
}

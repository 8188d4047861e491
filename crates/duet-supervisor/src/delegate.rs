//! The delegated frontend runner.
//!
//! The supervisor relaunches its own executable with the runner flag and
//! passes everything the frontend needs through the environment. The runner
//! reads it back into a [`FrontendEnv`] and hands over to a [`FrontendEntry`].

use crate::config::FrontendConfig;
use crate::env::{DATA_DIR, DUET_CONFIG, OLLAMA_API_BASE, OPENWEBUI_HOST, OPENWEBUI_PORT};
use duet_common::{LaunchError, LaunchResult, ServiceRole};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use tracing::info;

/// Configuration the supervisor handed to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendEnv {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub backend_url: String,
    pub config_path: Option<PathBuf>,
}

impl FrontendEnv {
    pub fn from_env() -> LaunchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> LaunchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| LaunchError::configuration(format!("{} is not set", key)))
        };

        let port_value = require(OPENWEBUI_PORT)?;
        let port = port_value.parse::<u16>().map_err(|_| {
            LaunchError::configuration(format!("{} is not a port: {}", OPENWEBUI_PORT, port_value))
        })?;

        Ok(Self {
            host: require(OPENWEBUI_HOST)?,
            port,
            data_dir: PathBuf::from(require(DATA_DIR)?),
            backend_url: require(OLLAMA_API_BASE)?,
            config_path: lookup(DUET_CONFIG).filter(|v| !v.is_empty()).map(PathBuf::from),
        })
    }
}

/// The frontend's single entry point. Returns the frontend's exit code.
pub trait FrontendEntry {
    fn run(&self, env: &FrontendEnv, args: &[OsString]) -> LaunchResult<i32>;
}

/// Runs the configured frontend command.
///
/// On Unix the runner process image is replaced, so the PID the supervisor
/// holds is the frontend's own and its signals reach the frontend directly.
/// Elsewhere the command is spawned and waited on.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    command: Vec<String>,
    pass_bind_args: bool,
}

impl CommandEntry {
    pub fn new(command: Vec<String>, pass_bind_args: bool) -> Self {
        Self {
            command,
            pass_bind_args,
        }
    }

    pub fn from_config(config: &FrontendConfig) -> Self {
        Self::new(config.command.clone(), config.pass_bind_args)
    }

    /// The command line that [`FrontendEntry::run`] executes.
    pub fn build(&self, env: &FrontendEnv, args: &[OsString]) -> LaunchResult<Command> {
        let (program, rest) = self
            .command
            .split_first()
            .ok_or_else(|| LaunchError::configuration("frontend command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(rest);
        if self.pass_bind_args {
            cmd.arg("--port")
                .arg(env.port.to_string())
                .arg("--host")
                .arg(&env.host);
        }
        cmd.args(args);
        Ok(cmd)
    }

    fn spawn_error(&self, e: io::Error) -> LaunchError {
        let program = self.command.first().cloned().unwrap_or_default();
        match e.kind() {
            io::ErrorKind::NotFound => LaunchError::binary_not_found(ServiceRole::Frontend, program),
            _ => LaunchError::launch_failed(ServiceRole::Frontend, format!("{}: {}", program, e)),
        }
    }
}

impl FrontendEntry for CommandEntry {
    fn run(&self, env: &FrontendEnv, args: &[OsString]) -> LaunchResult<i32> {
        let mut cmd = self.build(env, args)?;

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;

            // Only returns on failure.
            let err = cmd.exec();
            Err(self.spawn_error(err))
        }

        #[cfg(not(unix))]
        {
            let status = cmd.status().map_err(|e| self.spawn_error(e))?;
            Ok(status.code().unwrap_or(1))
        }
    }
}

/// Run the frontend through `entry` with configuration from `env`.
pub fn run_delegated(
    entry: &dyn FrontendEntry,
    env: &FrontendEnv,
    args: &[OsString],
) -> LaunchResult<i32> {
    info!(
        "Frontend runner: {}:{} (data {}, backend {})",
        env.host,
        env.port,
        env.data_dir.display(),
        env.backend_url
    );
    entry.run(env, args)
}

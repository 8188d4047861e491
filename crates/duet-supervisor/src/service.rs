//! Immutable descriptions of the two managed services.

use crate::config::{BackendConfig, FrontendConfig};
use crate::env::{
    connect_host, DATA_DIR, DUET_CONFIG, OLLAMA_DEBUG, OLLAMA_HOST, OLLAMA_MODELS, OPENWEBUI_HOST, OPENWEBUI_PORT,
};
use duet_common::ServiceRole;
use duet_monitoring::ReadinessOptions;
use duet_process::platform_executable;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Statuses that count as "up" for the backend.
pub const BACKEND_READY_STATUSES: &[u16] = &[200];
/// The frontend may answer with a redirect or a default 404 route while up.
pub const FRONTEND_READY_STATUSES: &[u16] = &[200, 302, 404];

/// How a service process is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// Run `path` with `args`.
    Executable { path: PathBuf, args: Vec<String> },
    /// Run `executable` (this program) again with the delegated-runner flag.
    SelfRelaunch { executable: PathBuf },
}

/// Everything the supervisor needs to start one service.
///
/// Environment values and the readiness URL are templates: `{port}` and
/// `{host}` are substituted with the resolved values at launch.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub role: ServiceRole,
    pub preferred_port: u16,
    pub port_range: u16,
    pub host: String,
    pub entry: EntryPoint,
    pub working_directory: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
    pub readiness_url: String,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
    pub accept_statuses: Vec<u16>,
}

impl ServiceSpec {
    /// Backend spec: `<app_dir>/ollama serve` unless the config names another
    /// executable, running in the backend state directory.
    pub fn backend(config: &BackendConfig, layout: &StateLayout, app_dir: &Path) -> Self {
        let path = config
            .executable
            .clone()
            .unwrap_or_else(|| platform_executable(app_dir, "ollama"));

        let mut environment = BTreeMap::new();
        environment.insert(OLLAMA_HOST.to_string(), "{host}:{port}".to_string());
        environment.insert(
            OLLAMA_MODELS.to_string(),
            layout.models_dir().to_string_lossy().into_owned(),
        );
        if config.debug {
            environment.insert(OLLAMA_DEBUG.to_string(), "1".to_string());
        }
        environment.extend(config.environment.clone());

        Self {
            role: ServiceRole::Backend,
            preferred_port: config.preferred_port,
            port_range: config.port_range,
            host: config.host.clone(),
            entry: EntryPoint::Executable {
                path,
                args: config.args.clone(),
            },
            working_directory: Some(layout.backend_dir()),
            environment,
            readiness_url: readiness_template(&config.host, &config.readiness_path),
            readiness_timeout: config.readiness_timeout,
            poll_interval: config.poll_interval,
            accept_statuses: BACKEND_READY_STATUSES.to_vec(),
        }
    }

    /// Frontend spec: this executable relaunched as the delegated runner.
    pub fn frontend(
        config: &FrontendConfig,
        layout: &StateLayout,
        runner: &Path,
        config_path: Option<&Path>,
    ) -> Self {
        let mut environment = BTreeMap::new();
        environment.insert(OPENWEBUI_HOST.to_string(), "{host}".to_string());
        environment.insert(OPENWEBUI_PORT.to_string(), "{port}".to_string());
        environment.insert(
            DATA_DIR.to_string(),
            layout.frontend_data_dir().to_string_lossy().into_owned(),
        );
        if let Some(path) = config_path {
            environment.insert(DUET_CONFIG.to_string(), path.to_string_lossy().into_owned());
        }
        environment.extend(config.environment.clone());

        Self {
            role: ServiceRole::Frontend,
            preferred_port: config.preferred_port,
            port_range: config.port_range,
            host: config.host.clone(),
            entry: EntryPoint::SelfRelaunch {
                executable: runner.to_path_buf(),
            },
            working_directory: None,
            environment,
            readiness_url: readiness_template(&config.host, &config.readiness_path),
            readiness_timeout: config.readiness_timeout,
            poll_interval: config.poll_interval,
            accept_statuses: FRONTEND_READY_STATUSES.to_vec(),
        }
    }

    /// The readiness URL for a service bound to `port`.
    pub fn readiness_url_for(&self, port: u16) -> String {
        self.readiness_url.replace("{port}", &port.to_string())
    }

    /// The environment with `{port}` and `{host}` substituted.
    pub fn render_env(&self, port: u16) -> BTreeMap<String, String> {
        let port = port.to_string();
        self.environment
            .iter()
            .map(|(key, value)| {
                let value = value.replace("{port}", &port).replace("{host}", &self.host);
                (key.clone(), value)
            })
            .collect()
    }

    pub fn readiness_options(&self) -> ReadinessOptions {
        ReadinessOptions::new(
            self.readiness_timeout,
            self.poll_interval,
            self.accept_statuses.clone(),
        )
    }
}

fn readiness_template(bind_host: &str, path: &str) -> String {
    format!("http://{}:{{port}}{}", connect_host(bind_host), path)
}

/// On-disk layout of the persisted state under one root.
///
/// ```text
/// <root>/.ollama/          backend working directory
/// <root>/.ollama/models/   backend model store
/// <root>/data/             frontend data
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend_dir(&self) -> PathBuf {
        self.root.join(".ollama")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.backend_dir().join("models")
    }

    pub fn frontend_data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Create every directory that does not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.models_dir())?;
        std::fs::create_dir_all(self.frontend_data_dir())?;
        Ok(())
    }
}

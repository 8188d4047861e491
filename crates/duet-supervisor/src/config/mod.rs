use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env::DUET_CONFIG;

pub mod validation;

/// File name looked up next to the executable when `DUET_CONFIG` is unset.
pub const CONFIG_FILE_NAME: &str = "duet.yaml";

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Root of the persisted state. Defaults to the executable's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_root: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub open_browser: bool,

    #[serde(default = "default_browser_delay", with = "duration_serde")]
    pub browser_delay: Duration,

    /// How long each service gets to exit after the graceful signal.
    #[serde(default = "default_graceful_timeout", with = "duration_serde")]
    pub graceful_timeout: Duration,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub frontend: FrontendConfig,
}

/// Inference backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend executable. Defaults to `ollama` next to the supervisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_backend_args")]
    pub args: Vec<String>,
    #[serde(default = "default_backend_port")]
    pub preferred_port: u16,
    #[serde(default = "default_port_range")]
    pub port_range: u16,
    #[serde(default = "default_backend_host")]
    pub host: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_backend_readiness_path")]
    pub readiness_path: String,
    #[serde(default = "default_backend_readiness_timeout", with = "duration_serde")]
    pub readiness_timeout: Duration,
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Web frontend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Command the delegated runner executes, e.g. `[open-webui, serve]`.
    #[serde(default = "default_frontend_command")]
    pub command: Vec<String>,
    /// Append `--port <port> --host <host>` to `command`.
    #[serde(default = "default_true")]
    pub pass_bind_args: bool,
    #[serde(default = "default_frontend_port")]
    pub preferred_port: u16,
    #[serde(default = "default_port_range")]
    pub port_range: u16,
    #[serde(default = "default_frontend_host")]
    pub host: String,
    #[serde(default = "default_frontend_readiness_path")]
    pub readiness_path: String,
    #[serde(default = "default_frontend_readiness_timeout", with = "duration_serde")]
    pub readiness_timeout: Duration,
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            open_browser: true,
            browser_delay: default_browser_delay(),
            graceful_timeout: default_graceful_timeout(),
            backend: BackendConfig::default(),
            frontend: FrontendConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            executable: None,
            args: default_backend_args(),
            preferred_port: default_backend_port(),
            port_range: default_port_range(),
            host: default_backend_host(),
            debug: false,
            readiness_path: default_backend_readiness_path(),
            readiness_timeout: default_backend_readiness_timeout(),
            poll_interval: default_poll_interval(),
            environment: BTreeMap::new(),
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            command: default_frontend_command(),
            pass_bind_args: true,
            preferred_port: default_frontend_port(),
            port_range: default_port_range(),
            host: default_frontend_host(),
            readiness_path: default_frontend_readiness_path(),
            readiness_timeout: default_frontend_readiness_timeout(),
            poll_interval: default_poll_interval(),
            environment: BTreeMap::new(),
        }
    }
}

impl LauncherConfig {
    /// Find the configuration file: `$DUET_CONFIG` if set, otherwise
    /// `duet.yaml` in `app_dir` if it exists.
    pub fn locate(app_dir: &Path) -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(DUET_CONFIG).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }

        let candidate = app_dir.join(CONFIG_FILE_NAME);
        candidate.is_file().then_some(candidate)
    }

    /// Load from `path`, or fall back to defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: LauncherConfig = serde_yaml::from_str(content)
            .context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Directory all persisted state lives under.
    pub fn data_root(&self, app_dir: &Path) -> PathBuf {
        self.data_root
            .clone()
            .unwrap_or_else(|| app_dir.to_path_buf())
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_browser_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_graceful_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_backend_args() -> Vec<String> {
    vec!["serve".to_string()]
}

fn default_backend_port() -> u16 {
    11434
}

fn default_frontend_port() -> u16 {
    3000
}

fn default_port_range() -> u16 {
    10
}

fn default_backend_host() -> String {
    "127.0.0.1".to_string()
}

fn default_frontend_host() -> String {
    "0.0.0.0".to_string()
}

fn default_backend_readiness_path() -> String {
    "/api/tags".to_string()
}

fn default_frontend_readiness_path() -> String {
    "/".to_string()
}

fn default_backend_readiness_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_frontend_readiness_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_frontend_command() -> Vec<String> {
    vec!["open-webui".to_string(), "serve".to_string()]
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            serializer.serialize_str(&format!("{}s", millis / 1000))
        } else {
            serializer.serialize_str(&format!("{}ms", millis))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        // "ms" before "s"
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num_str) = s.strip_suffix('m') {
            let mins: u64 = num_str.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

//! Environment variables that carry configuration between the supervisor,
//! the delegated frontend runner and the two services.

/// Backend bind address, `<host>:<port>`.
pub const OLLAMA_HOST: &str = "OLLAMA_HOST";
/// Backend model store.
pub const OLLAMA_MODELS: &str = "OLLAMA_MODELS";
/// Set to `1` to enable backend debug logging.
pub const OLLAMA_DEBUG: &str = "OLLAMA_DEBUG";

pub const OPENWEBUI_HOST: &str = "OPENWEBUI_HOST";
pub const OPENWEBUI_PORT: &str = "OPENWEBUI_PORT";
/// Frontend application data directory.
pub const DATA_DIR: &str = "DATA_DIR";

/// Backend base URL as seen by the frontend.
pub const OLLAMA_API_BASE: &str = "OLLAMA_API_BASE";
/// Same value as [`OLLAMA_API_BASE`], under the name newer frontends read.
pub const OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";

/// Configuration file path, also forwarded to the delegated runner.
pub const DUET_CONFIG: &str = "DUET_CONFIG";

/// Host a client connects to for a service bound to `bind_host`.
///
/// Wildcard binds are reached over loopback. IPv6 literals come back
/// bracketed for use in a URL.
pub fn connect_host(bind_host: &str) -> String {
    match bind_host {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1".to_string(),
        host if host.contains(':') && !host.starts_with('[') => format!("[{}]", host),
        host => host.to_string(),
    }
}

/// Base URL of a backend bound to `bind_host:port`.
pub fn backend_base_url(bind_host: &str, port: u16) -> String {
    format!("http://{}:{}", connect_host(bind_host), port)
}

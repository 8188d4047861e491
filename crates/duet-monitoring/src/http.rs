// HTTP readiness probe

use crate::{ProbeError, ProbeOutcome, ProbeResult};
use chrono::Utc;
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, trace};

/// Upper bound for a single readiness probe.
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// HTTP probe configuration
#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub expected_status: Vec<u16>,
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout: MAX_PROBE_TIMEOUT,
            expected_status: vec![200],
        }
    }
}

impl HttpProbeConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Per-request timeout, capped at [`MAX_PROBE_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(MAX_PROBE_TIMEOUT);
        self
    }

    pub fn with_expected_status(mut self, status_codes: Vec<u16>) -> Self {
        self.expected_status = status_codes;
        self
    }
}

/// Perform one GET against the configured endpoint.
///
/// Connection failures and timeouts are not errors: they produce a rejected
/// [`ProbeOutcome`] with the failure in `error_message`. Only an endpoint
/// that cannot be parsed as a URI is an error.
pub async fn probe_http(config: &HttpProbeConfig) -> ProbeResult<ProbeOutcome> {
    let start_time = Instant::now();

    let uri: Uri = config
        .endpoint
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| ProbeError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        })?;

    let client = Client::builder(TokioExecutor::new()).build_http();

    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("User-Agent", concat!("duet/", env!("CARGO_PKG_VERSION")))
        .body(Empty::<Bytes>::new())
        .map_err(|e| ProbeError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        })?;

    let response = match timeout(config.timeout, client.request(request)).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            trace!("HTTP probe connection failed: {} - {}", config.endpoint, e);
            return Ok(not_accepted(start_time, None, format!("Connection failed: {}", e)));
        }
        Err(_) => {
            trace!("HTTP probe timeout: {}", config.endpoint);
            return Ok(not_accepted(
                start_time,
                None,
                format!("Timeout after {:?}", config.timeout),
            ));
        }
    };

    let status = response.status().as_u16();
    let elapsed = start_time.elapsed().as_millis() as u64;
    let accepted = config.expected_status.contains(&status);

    debug!(
        "HTTP probe complete: {} - status={} accepted={} time={}ms",
        config.endpoint, status, accepted, elapsed
    );

    Ok(ProbeOutcome {
        accepted,
        status: Some(status),
        checked_at: Utc::now(),
        response_time_ms: Some(elapsed),
        error_message: if accepted {
            None
        } else {
            Some(format!("Unexpected status code: {}", status))
        },
    })
}

fn not_accepted(start_time: Instant, status: Option<u16>, message: String) -> ProbeOutcome {
    ProbeOutcome {
        accepted: false,
        status,
        checked_at: Utc::now(),
        response_time_ms: Some(start_time.elapsed().as_millis() as u64),
        error_message: Some(message),
    }
}

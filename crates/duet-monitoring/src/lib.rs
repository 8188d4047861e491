//! # Duet Monitoring
//!
//! Readiness checking for supervised services:
//! - single HTTP probes with an accepted-status set ([`http`])
//! - the bounded polling loop that waits for a service to come up while
//!   watching for it to crash ([`readiness`])

pub mod http;
pub mod readiness;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid readiness endpoint: {endpoint} - {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Result type for probe setup.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Outcome of one HTTP readiness probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub accepted: bool,
    /// Status code, when the server answered at all.
    pub status: Option<u16>,
    pub checked_at: DateTime<Utc>,
    pub response_time_ms: Option<u64>,
    pub error_message: Option<String>,
}

// Re-export main types
pub use http::*;
pub use readiness::*;

//! Bounded readiness polling.
//!
//! [`wait_ready`] is the only intentionally blocking wait during startup. Each
//! iteration checks process liveness *before* touching the network, so a
//! service that crashes during its startup window is reported as
//! [`ReadinessResult::ProcessExited`] within one polling interval instead of
//! being polled until the deadline.

use crate::http::{probe_http, HttpProbeConfig, MAX_PROBE_TIMEOUT};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Liveness of a monitored process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// Exited with the given code (`None` when killed by a signal).
    Exited(Option<i32>),
}

/// Something whose process can be checked for exit without blocking.
pub trait LivenessProbe {
    fn liveness(&mut self) -> Liveness;
}

/// Outcome of a readiness probe or polling attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessResult {
    Ready,
    NotYetUp { reason: String },
    ProcessExited { exit_code: Option<i32> },
    TimedOut { last_failure: String },
}

impl ReadinessResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessResult::Ready)
    }
}

/// Polling parameters for [`wait_ready`].
#[derive(Debug, Clone)]
pub struct ReadinessOptions {
    pub timeout: Duration,
    pub interval: Duration,
    pub accept_statuses: Vec<u16>,
    pub probe_timeout: Duration,
}

impl ReadinessOptions {
    pub fn new(timeout: Duration, interval: Duration, accept_statuses: Vec<u16>) -> Self {
        Self {
            timeout,
            interval,
            accept_statuses,
            probe_timeout: MAX_PROBE_TIMEOUT,
        }
    }
}

/// Probe `url` once. Returns `Ready` or `NotYetUp`.
pub async fn probe_once(url: &str, accept_statuses: &[u16], probe_timeout: Duration) -> ReadinessResult {
    let config = HttpProbeConfig::new(url)
        .with_timeout(probe_timeout)
        .with_expected_status(accept_statuses.to_vec());

    match probe_http(&config).await {
        Ok(data) if data.accepted => ReadinessResult::Ready,
        Ok(data) => ReadinessResult::NotYetUp {
            reason: data
                .error_message
                .unwrap_or_else(|| "status not accepted".to_string()),
        },
        Err(e) => ReadinessResult::NotYetUp {
            reason: e.to_string(),
        },
    }
}

/// Poll `url` until it answers with an accepted status, the target process
/// exits, or `options.timeout` elapses.
///
/// Never returns `NotYetUp`.
pub async fn wait_ready<P: LivenessProbe + ?Sized>(
    url: &str,
    target: &mut P,
    options: &ReadinessOptions,
) -> ReadinessResult {
    let deadline = Instant::now() + options.timeout;
    let mut attempts: u32 = 0;
    let mut last_failure = String::from("no probe attempted");

    loop {
        if let Liveness::Exited(exit_code) = target.liveness() {
            debug!("Process exited while waiting for {} (code {:?})", url, exit_code);
            return ReadinessResult::ProcessExited { exit_code };
        }

        attempts += 1;
        match probe_once(url, &options.accept_statuses, options.probe_timeout).await {
            ReadinessResult::Ready => {
                debug!("{} ready after {} attempt(s)", url, attempts);
                return ReadinessResult::Ready;
            }
            ReadinessResult::NotYetUp { reason } => {
                trace!("{} not yet up (attempt {}): {}", url, attempts, reason);
                last_failure = reason;
            }
            other => return other,
        }

        let now = Instant::now();
        if now >= deadline {
            // A crash during the last probe still wins over a timeout.
            if let Liveness::Exited(exit_code) = target.liveness() {
                return ReadinessResult::ProcessExited { exit_code };
            }
            return ReadinessResult::TimedOut { last_failure };
        }

        tokio::time::sleep(options.interval.min(deadline - now)).await;
    }
}

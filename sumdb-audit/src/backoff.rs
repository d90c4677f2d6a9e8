//! Retry with exponential backoff for remote fetches.
//!
//! Only remote fetches are retried; store failures indicate a fatal local
//! fault and surface immediately. Each fetch gets a fresh backoff clock, so
//! parallel fetches that hit transients do not collapse to serial latency.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::AuditError;
use crate::remote::FetchError;

/// Retry policy parameters for remote fetches.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound on the delay between retries.
    pub max: Duration,
    /// Growth factor applied to the delay after each retry.
    pub multiplier: f64,
    /// Number of retries before the fetch is abandoned.
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(60),
            multiplier: 1.5,
            max_retries: 10,
        }
    }
}

/// The backoff clock of a single fetch.
struct ExponentialBackoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    remaining: u32,
}

impl ExponentialBackoff {
    fn new(config: &BackoffConfig) -> Self {
        Self {
            next: config.initial,
            max: config.max,
            multiplier: config.multiplier,
            remaining: config.max_retries,
        }
    }

    /// The delay to sleep before the next retry, or `None` once the retry
    /// budget is spent.
    fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.next;
        self.next = self.next.mul_f64(self.multiplier).min(self.max);
        Some(delay)
    }
}

/// Run `op` until it succeeds, retrying transient failures with a fresh
/// exponential backoff clock.
///
/// Permanent failures and an exhausted retry budget both surface as
/// [`AuditError::FetchFailed`]; cancellation is honoured between attempts.
pub(crate) fn retry_fetch<T>(
    config: &BackoffConfig,
    cancel: &CancelToken,
    mut op: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, AuditError> {
    let mut backoff = ExponentialBackoff::new(config);
    let mut attempts = 0u32;
    loop {
        cancel.check()?;
        attempts += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(source @ FetchError::Permanent(_)) => {
                return Err(AuditError::FetchFailed { attempts, source });
            }
            Err(source @ FetchError::Transient(_)) => match backoff.next_delay() {
                Some(delay) => {
                    warn!(attempts, ?delay, error = %source, "transient fetch failure, backing off");
                    thread::sleep(delay);
                }
                None => return Err(AuditError::FetchFailed { attempts, source }),
            },
        }
    }
}

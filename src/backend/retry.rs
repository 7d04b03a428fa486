//! Bounded retry with exponential backoff for backend calls.
use crate::error::BackendError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling up to the cap.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// The last error once retries are exhausted or a permanent error is hit.
#[derive(Debug, Clone)]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: BackendError,
}

/// Run `call` until it succeeds, fails permanently, or retries run out.
///
/// `call` receives the 1-based attempt number.
pub fn call_with_retry<T, F>(policy: &RetryPolicy, label: &str, mut call: F) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Result<T, BackendError>,
{
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 1;
    loop {
        match call(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "backend retry succeeded");
                }
                return Ok(value);
            }
            Err(error) if error.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_for(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "backend call failed; retrying"
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(error) => {
                return Err(RetryFailure {
                    attempts: attempt,
                    error,
                })
            }
        }
    }
}

//! Retry with exponential backoff
//!
//! Only errors for which [`SaveSyncError::is_transient`] holds are retried;
//! authentication, integrity and capability failures return immediately.
//! This is the only retry layer; the HTTP adapters never retry in-call.
//!
//! Backoff schedule with the default base: 500ms, 1s, 2s, ... A rate-limited
//! error's `Retry-After` raises the delay when it is longer.

use std::future::Future;
use std::time::Duration;

use savesync_core::error::SaveSyncError;
use tracing::{info, warn};

/// Base delay for exponential backoff
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// How many times, and how patiently, to retry transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: BASE_DELAY,
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Executes an async operation, retrying transient failures
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    f: F,
) -> Result<T, SaveSyncError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SaveSyncError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_retries && err.is_transient() => {
                let delay = policy
                    .delay_for(attempt)
                    .max(err.retry_after().unwrap_or_default());
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

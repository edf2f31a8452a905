//! Retry logic with exponential backoff for upstream market data calls

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::StockConfig;
use crate::error::{Result, StockError};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    pub initial_backoff: Duration,

    /// Upper bound for a single delay
    pub max_backoff: Duration,

    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Policy derived from the service configuration
    pub fn from_config(config: &StockConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.retry_backoff_base,
            max_backoff: Duration::from_secs(30),
            attempt_timeout: config.request_timeout,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_duration(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let backoff = self.initial_backoff * 2_u32.saturating_pow(retry - 1);
        backoff.min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(operation = operation_name, attempt, attempts, "Calling upstream");

            let outcome = match timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(StockError::Timeout(self.attempt_timeout)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff_duration(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "Transient failure, retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

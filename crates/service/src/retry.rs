use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use configs::RetryConfig;

use crate::errors::ServiceError;

/// Bounded re-run of a whole fetch-mutate-write cycle after a conflicting write.
///
/// Only conflicts are retried: auth, validation and transport failures go
/// straight back to the caller. Disabled policies run the operation once.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_max: Duration, enabled: bool) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff_base, backoff_max, enabled }
    }

    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, false)
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(
            cfg.max_attempts,
            Duration::from_millis(cfg.backoff_base_ms),
            Duration::from_millis(cfg.backoff_max_ms),
            cfg.enabled,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_attempts(&self) -> u32 {
        if self.enabled { self.max_attempts } else { 1 }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if !self.enabled || attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    pub fn should_retry(&self, attempt: u32, error: &ServiceError) -> bool {
        self.enabled && attempt < self.max_attempts && error.is_conflict()
    }

    /// Run `operation` until it succeeds, fails with a non-conflict, or attempts run out.
    pub async fn run<F, Fut, T>(&self, op_name: &str, mut operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(op = op_name, attempt, "succeeded after conflict retry");
                    }
                    return Ok(value);
                }
                Err(err) if self.should_retry(attempt, &err) => {
                    let delay = self.backoff(attempt);
                    warn!(op = op_name, attempt, ?delay, error = %err, "write conflicted; re-fetching and retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

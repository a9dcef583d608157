use std::thread;
use std::time::Duration;

use chatdbg_core::config::RetryConfig;
use chatdbg_core::error::AppError;

/// Bounded retry with a fixed backoff. Only rate-limit failures are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            backoff: Duration::from_secs(cfg.backoff_secs),
        }
    }
}

impl RetryPolicy {
    pub fn run<T>(
        &self,
        what: &str,
        mut call: impl FnMut() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Ok(v) => return Ok(v),
                Err(e) if e.is_rate_limited() && attempt < max => {
                    tracing::warn!(
                        what,
                        attempt,
                        max,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "rate limited; retrying"
                    );
                    thread::sleep(self.backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Statuses worth retrying: rate limiting and transient server failures.
const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const DEFAULT_MAX_RETRIES: u32 = 8;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Bounded exponential backoff for remote calls.
///
/// Wraps a closure that builds a fresh future per attempt, so each retry
/// re-issues the underlying request from scratch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// `max_retries` bounds total attempts; at least one attempt always runs.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
        }
    }

    /// Run `op`, retrying on failures whose status is retryable.
    ///
    /// Non-retryable failures and the final failed attempt return the
    /// original error unchanged.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = err
                        .status()
                        .is_some_and(|status| self.retryable_statuses.contains(&status));
                    if !retryable || attempt + 1 >= self.max_retries {
                        return Err(err);
                    }

                    let delay = self.backoff(attempt);
                    debug!(attempt, ?delay, error = %err, "Transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    // base * 2^attempt plus a small linear term, no jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let seconds = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32)
            + 0.1 * f64::from(attempt);
        Duration::from_secs_f64(seconds)
    }
}

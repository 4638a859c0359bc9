//! Bounded retry with exponential backoff.
//!
//! Only failures the caller classifies as transient are retried. Schema and
//! mapping mismatches must never be passed through a retry loop.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the first attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay to wait before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let capped = if self.initial_delay.as_secs_f64() * factor >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            self.initial_delay.mul_f64(factor)
        };

        if self.jitter {
            capped + capped.mul_f64(0.25 * rand::random::<f64>())
        } else {
            capped
        }
    }

    /// Run `op`, retrying while `is_transient` accepts the error and retries remain.
    pub async fn run<T, E, F, Fut, P>(&self, what: &str, mut op: F, is_transient: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        e,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

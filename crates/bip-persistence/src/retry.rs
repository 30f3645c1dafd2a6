//! Retry combinator with capped exponential backoff.
//!
//! The policy and the retryable/fatal predicate are passed in explicitly, so
//! backoff behavior is tested on its own and the connection code only
//! supplies the operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Backoff policy for [`retry`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, and the lower bound of every delay
    pub base_delay: Duration,
    /// Upper bound of every delay
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Wait before retry number `retry` (1-based).
    ///
    /// `multiplier * base_delay * 2^(retry - 1)`, clamped to
    /// `[base_delay, max_delay]`. The default policy waits 2 s, 4 s, 8 s,
    /// then 10 s.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        // cap the exponent to keep the float finite
        let exponent = retry.min(32) - 1;
        let secs =
            self.multiplier * self.base_delay.as_secs_f64() * 2f64.powi(exponent as i32);
        let delay = if secs.is_finite() && secs >= 0.0 {
            Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
        } else {
            self.max_delay
        };
        delay.max(self.base_delay).min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, the error is not retryable, or the
/// attempt budget is spent.
///
/// `operation` receives the 1-based attempt number. Every retry is logged at
/// warn level before sleeping. The last error is returned as-is.
///
/// # Example
///
/// ```rust,ignore
/// let session = retry(&RetryPolicy::default(), "connect", PersistenceError::is_retryable, |_| {
///     connector.open(&config)
/// })
/// .await?;
/// ```
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && is_retryable(&err) => {
                let delay = policy.delay_for_retry(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "giving up"
                    );
                }
                return Err(err);
            }
        }
    }
}

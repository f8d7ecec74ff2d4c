//! Retry and backoff utilities.
//!
//! Bounded exponential backoff with lightweight jitter around a single
//! request attempt. Only error kinds the API marks as transient are worth
//! retrying (see [`Error::is_retryable`](crate::Error::is_retryable));
//! the policy itself is error-agnostic and takes a predicate.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Policy controlling retry attempts and exponential backoff behavior.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt. `0` (the
    /// default) surfaces the first retryable failure immediately.
    pub max_attempts: u32,
    /// Hard ceiling on any single backoff delay.
    pub max_backoff: Duration,
    /// Upper bound of the random jitter added to each delay.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Policy that never retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 0,
            max_backoff: Duration::from_secs(60),
            jitter: Duration::from_millis(500),
        }
    }

    /// Default-shaped policy with a custom retry budget.
    pub const fn with_max_attempts(max_attempts: u32) -> Self {
        let mut policy = Self::none();
        policy.max_attempts = max_attempts;
        policy
    }

    /// Computes the delay applied before the given retry.
    ///
    /// `attempt` is 1-based: it is the number of failures seen so far. The
    /// delay is `2^attempt` seconds plus a jitter draw, capped at
    /// `max_backoff`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = Duration::from_secs(2u64.saturating_pow(attempt));
        let delay = base.saturating_add(jitter_duration(self.jitter, attempt));
        delay.min(self.max_backoff)
    }

    /// Returns the delay before the next attempt, or `None` once the
    /// retry budget is exhausted.
    pub(crate) fn next_delay(&self, attempts: u32) -> Option<Duration> {
        (attempts <= self.max_attempts).then(|| self.delay_for_attempt(attempts))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Executes an async operation with retry behavior controlled by `policy`.
///
/// `op` receives the number of failures seen so far (0 on the first
/// attempt) and must return a future resolving to the attempt result.
/// `should_retry` decides whether each error is transient; errors it
/// rejects propagate immediately, as does the original error once the
/// retry budget is spent.
pub async fn retry_async<T, E, Op, Fut, ShouldRetry>(
    policy: &RetryPolicy,
    mut op: Op,
    mut should_retry: ShouldRetry,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    ShouldRetry: FnMut(&E) -> bool,
{
    let mut attempts = 0;

    loop {
        match op(attempts).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(&error) {
                    return Err(error);
                }
                attempts += 1;
                let Some(delay) = policy.next_delay(attempts) else {
                    return Err(error);
                };
                debug!(
                    event = "retry_attempt_failed",
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn jitter_duration(max_jitter: Duration, attempt: u32) -> Duration {
    let limit_nanos = max_jitter.as_nanos().min(u64::MAX as u128) as u64;
    if limit_nanos == 0 {
        return Duration::ZERO;
    }

    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let mixed = now_nanos ^ (u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    Duration::from_nanos(mixed % limit_nanos)
}

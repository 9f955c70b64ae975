//! Bounded retry with exponential backoff.
//!
//! IAM credentials are eventually consistent: an access key created moments
//! ago can be rejected with `InvalidClientTokenId` until it propagates. The
//! bootstrap validator wraps its read-only probes in this helper; nothing
//! else retries.

use crate::{PaveError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff schedule: `base_delay * 2^attempt`, capped at `max_delay`, for
/// at most `max_attempts` tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// Delay before the retry following `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `op`, retrying per `policy` while `is_retryable` accepts the error.
///
/// The final error is returned unchanged once attempts are exhausted or the
/// predicate rejects it.
pub async fn retry_with_backoff<T, F, Fut, P>(
    policy: RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&PaveError) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    "attempt {} failed ({err}), retrying in {:.1}s",
                    attempt + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> PaveError {
        PaveError::Aws {
            code: "InvalidClientTokenId".to_string(),
            message: "token not yet propagated".to_string(),
        }
    }

    #[test]
    fn test_delay_schedule_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2));
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let result = retry_with_backoff(
            RetryPolicy::new(5, Duration::from_millis(10)),
            PaveError::is_transient_auth,
            move || {
                let calls = seen.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok("ready")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let result: Result<()> = retry_with_backoff(
            RetryPolicy::default(),
            PaveError::is_transient_auth,
            move || {
                let calls = seen.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(PaveError::AccessDenied("not authorized".to_string()))
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let result: Result<()> = retry_with_backoff(
            RetryPolicy::new(3, Duration::from_millis(10)),
            PaveError::is_transient_auth,
            move || {
                let calls = seen.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            },
        )
        .await;

        assert!(matches!(result, Err(PaveError::Aws { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

//! Fixed-delay retry policies
//!
//! Two exhaustion behaviours exist side by side:
//!
//! - [`OnExhausted::Fail`]: after the last attempt the last error is returned.
//! - [`OnExhausted::FinalAttempt`]: after the last failed attempt one more
//!   call is made outside the retry loop and its outcome, success or error,
//!   is returned unconditionally.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{HarvestError, HarvestResult};

/// What to do once every retried attempt has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExhausted {
    /// Return the last error
    Fail,
    /// Make one unretried call and return whatever it produces
    FinalAttempt,
}

/// Retry configuration injected into a retrieval operation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts inside the retry loop (including the first)
    pub attempts: u32,
    /// Fixed sleep between attempts
    pub delay: Duration,
    pub on_exhausted: OnExhausted,
    /// Errors for which another attempt is allowed
    pub retry_if: fn(&HarvestError) -> bool,
}

fn any_error(_: &HarvestError) -> bool {
    true
}

impl RetryPolicy {
    /// Organization asset listing: 7 attempts 5s apart, then one final call.
    /// Every error is retried.
    pub fn assets() -> Self {
        Self {
            attempts: 7,
            delay: Duration::from_secs(5),
            on_exhausted: OnExhausted::FinalAttempt,
            retry_if: any_error,
        }
    }

    /// Bulk CVE enrichment: 10 attempts 1s apart, then the last error.
    pub fn bulk_enrichment() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(1),
            on_exhausted: OnExhausted::Fail,
            retry_if: HarvestError::is_retryable,
        }
    }

    /// Single attempt, no delay
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
            on_exhausted: OnExhausted::Fail,
            retry_if: any_error,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Run `call` under this policy
    ///
    /// `operation` only labels log lines.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> HarvestResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HarvestResult<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !(self.retry_if)(&e) => return Err(e),
                Err(e) => {
                    warn!(operation, attempt, attempts, error = %e, "Attempt failed");
                    last_error = Some(e);
                }
            }

            let more_to_come = attempt < attempts || self.on_exhausted == OnExhausted::FinalAttempt;
            if more_to_come && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }

        match self.on_exhausted {
            OnExhausted::FinalAttempt => {
                warn!(operation, "Retries exhausted, making final attempt");
                call().await
            }
            OnExhausted::Fail => Err(last_error.unwrap_or_else(|| {
                HarvestError::malformed(operation, "retry loop made no attempts")
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(fail_until: u32, calls: &AtomicU32) -> HarvestResult<u32> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= fail_until {
            Err(HarvestError::status("/flaky", 503, "unavailable"))
        } else {
            Ok(n)
        }
    }

    #[tokio::test]
    async fn test_assets_policy_succeeds_on_seventh_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::assets().with_delay(Duration::ZERO);

        let result = policy.run("assets", || async move { flaky(6, counter) }).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_assets_policy_returns_final_attempt_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::assets().with_delay(Duration::ZERO);

        let result = policy.run("assets", || async move { flaky(7, counter) }).await;

        assert_eq!(result.unwrap(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_assets_policy_returns_final_attempt_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::assets().with_delay(Duration::ZERO);

        let result = policy.run("assets", || async move { flaky(100, counter) }).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_assets_policy_does_not_repeat_a_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::assets().with_delay(Duration::ZERO);

        policy.run("assets", || async move { flaky(0, counter) }).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bulk_policy_raises_after_ten_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::bulk_enrichment().with_delay(Duration::ZERO);

        let result = policy.run("enrich", || async move { flaky(100, counter) }).await;

        assert!(matches!(result, Err(HarvestError::Upstream { status: Some(503), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::bulk_enrichment().with_delay(Duration::ZERO);

        let result: HarvestResult<()> = policy
            .run("enrich", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HarvestError::BatchTooLarge { size: 11, limit: 10 })
            })
            .await;

        assert!(matches!(result, Err(HarvestError::BatchTooLarge { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::bulk_enrichment().with_attempts(3);
        let started = tokio::time::Instant::now();

        let _ = policy.run("enrich", || async move { flaky(100, counter) }).await;

        // Two sleeps between three attempts, none after the last.
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }
}

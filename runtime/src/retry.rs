//! Retry logic with exponential backoff for handling transient failures.
//!
//! Storage backends fail transiently (disk pressure, sandboxed file systems,
//! flaky network mounts). This module provides the single retry engine used
//! by both the store's load path and the background write queue.
//!
//! # Example
//!
//! ```rust
//! use trolley_runtime::retry::{RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::new()
//!     .with_max_attempts(5)
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_max_delay(Duration::from_secs(10));
//!
//! let result = retry_with_backoff(&policy, "example", || async {
//!     Ok::<_, String>(42)
//! }).await?;
//!
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy for handling transient failures.
///
/// Implements exponential backoff with jitter to handle transient failures
/// gracefully without overwhelming the storage backend.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt)
    max_attempts: u32,

    /// Initial delay before first retry
    initial_delay: Duration,

    /// Maximum delay between retries (caps exponential backoff)
    max_delay: Duration,

    /// Multiplier for exponential backoff (2.0 = double each time)
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create a new retry policy with default settings.
    ///
    /// Defaults:
    /// - `max_attempts`: 5
    /// - `initial_delay`: 1 second
    /// - `max_delay`: 32 seconds
    /// - `backoff_multiplier`: 2.0 (exponential)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            backoff_multiplier: 2.0,
        }
    }

    /// Set maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay before first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay between retries.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate the un-jittered delay for a given attempt number (0-indexed).
    ///
    /// `delay = min(initial_delay * multiplier^attempt, max_delay)`
    #[must_use]
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        // Note: Cast is safe since max_attempts defaults to 5 (well within i32 range)
        #[allow(clippy::cast_possible_wrap)]
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);

        let capped_secs = base_delay_secs.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped_secs)
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff with jitter:
    /// `delay = min(initial_delay * multiplier^attempt, max_delay) * (0.5 + random(0.5))`
    ///
    /// Jitter prevents thundering herd when many writers retry at once.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let capped = self.base_delay_for_attempt(attempt);

        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(capped.as_secs_f64() * jitter)
    }

    /// Get maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check if we should retry based on attempt number.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry an async operation with exponential backoff.
///
/// Attempts the operation until it succeeds or the policy's attempt budget
/// is exhausted. Retry attempts are logged and recorded as metrics under
/// the `operation_name` label.
///
/// # Arguments
///
/// * `policy` - Retry policy configuration
/// * `operation_name` - Name for logging/metrics (e.g., "`storage_set`")
/// * `operation` - Async operation to retry (must be `FnMut` to allow multiple calls)
///
/// # Returns
///
/// Returns `Ok(T)` if the operation succeeds within the attempt budget,
/// or `Err(E)` with the last error once attempts are exhausted.
///
/// # Example
///
/// ```rust
/// use trolley_runtime::retry::{RetryPolicy, retry_with_backoff};
///
/// # async fn example() -> Result<(), String> {
/// let policy = RetryPolicy::default();
///
/// let result = retry_with_backoff(&policy, "fetch", || async {
///     Ok::<_, String>(42)
/// }).await?;
///
/// assert_eq!(result, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    metrics::counter!(
                        "store.retry.success",
                        "operation" => operation_name.to_string()
                    )
                    .increment(1);
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if !policy.should_retry(attempt + 1) {
                    metrics::counter!(
                        "store.retry.exhausted",
                        "operation" => operation_name.to_string()
                    )
                    .increment(1);
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        error = %error,
                        "Operation failed after exhausting retries"
                    );
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt);
                metrics::counter!(
                    "store.retry.attempt",
                    "operation" => operation_name.to_string()
                )
                .increment(1);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "Operation failed, retrying after delay"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn base_delay_grows_exponentially() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10));

        assert_eq!(policy.base_delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.base_delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn base_delay_caps_at_max() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(10.0)
            .with_max_delay(Duration::from_secs(2));

        // 1s * 10^5 = 100,000s, but capped at 2s
        assert_eq!(policy.base_delay_for_attempt(5), Duration::from_secs(2));
    }

    #[test]
    fn should_retry_respects_attempt_budget() {
        let policy = RetryPolicy::new().with_max_attempts(3);

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    proptest! {
        #[test]
        fn jittered_delay_stays_within_half_to_full_base(attempt in 0u32..8) {
            let policy = RetryPolicy::new()
                .with_initial_delay(Duration::from_millis(50))
                .with_max_delay(Duration::from_secs(5));

            let base = policy.base_delay_for_attempt(attempt);
            let jittered = policy.delay_for_attempt(attempt);

            prop_assert!(jittered <= base);
            prop_assert!(jittered.as_secs_f64() >= base.as_secs_f64() * 0.5 - f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_try_without_retrying() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = retry_with_backoff(&policy, "test_op", || {
            let c = Arc::clone(&calls_clone);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new()
            .with_max_attempts(4)
            .with_initial_delay(Duration::from_millis(5));

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = retry_with_backoff(&policy, "test_op", || {
            let c = Arc::clone(&calls_clone);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_attempts_exhausted() {
        let policy = RetryPolicy::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(5));

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = retry_with_backoff(&policy, "test_op", || {
            let c = Arc::clone(&calls_clone);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>("persistent failure".to_string())
            }
        })
        .await;

        assert_eq!(result, Err("persistent failure".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

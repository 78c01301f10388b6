//! Retry logic with exponential backoff for transient errors.
//!
//! Only [`RemoteError`]s whose kind is retryable (network failures and rate
//! limiting) are retried. Waits between attempts observe the caller's
//! [`CancelToken`]. A rate-limited error that carries a reset time waits
//! for that reset instead of the exponential backoff.

use reconcile::{CancelToken, RemoteError, RemoteResult};
use std::time::Duration;

/// Backoff settings
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before waiting for the next attempt.
    ///
    /// `attempt` is 1-indexed and counts the attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &RemoteError, delay: Duration);
}

/// No-op callback.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &RemoteError, _delay: Duration) {}
}

/// Callback that logs retries as warnings.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &RemoteError, delay: Duration) {
        log::warn!(
            "Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {}ms...",
            delay.as_millis()
        );
    }
}

/// Delay before retrying after `err`
///
/// A wait requested by the remote (a rate-limit reset or `retry-after`)
/// replaces the backoff and is not capped by `max_delay`.
pub fn wait_before_retry(config: &RetryConfig, attempt: u32, err: &RemoteError) -> Duration {
    err.retry_after
        .unwrap_or_else(|| config.delay_for_attempt(attempt))
}

/// Execute an operation with retry logic.
///
/// Returns the first success, the first non-retryable error, or the last
/// error once attempts run out. A cancelled wait returns a cancelled error.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    cancel: &CancelToken,
    callback: &dyn RetryCallback,
    operation: F,
) -> RemoteResult<T>
where
    F: FnMut() -> RemoteResult<T>,
{
    with_retry_if(config, cancel, callback, RemoteError::is_retryable, operation)
}

/// [`with_retry`] with a caller-chosen subset of retryable errors
///
/// Non-idempotent calls retry only errors that prove the request was not
/// processed, such as rate limiting.
pub fn with_retry_if<T, F, P>(
    config: &RetryConfig,
    cancel: &CancelToken,
    callback: &dyn RetryCallback,
    should_retry: P,
    mut operation: F,
) -> RemoteResult<T>
where
    F: FnMut() -> RemoteResult<T>,
    P: Fn(&RemoteError) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(RemoteError::cancelled());
        }
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !err.is_retryable() || !should_retry(&err) || attempt + 1 >= max_attempts {
            return Err(err);
        }

        let delay = wait_before_retry(config, attempt, &err);
        callback.on_retry(attempt + 1, max_attempts, &err, delay);
        if !cancel.sleep(delay) {
            return Err(RemoteError::cancelled());
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::RemoteErrorKind;
    use std::cell::Cell;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
    }

    #[test]
    fn test_wait_uses_remote_reset() {
        let config = RetryConfig::default();
        let limited = RemoteError::from_status(403, "rate limit exceeded")
            .with_retry_after(Duration::from_secs(1801));
        assert_eq!(
            wait_before_retry(&config, 0, &limited),
            Duration::from_secs(1801)
        );

        let plain = RemoteError::from_status(502, "bad gateway");
        assert_eq!(wait_before_retry(&config, 2, &plain), Duration::from_secs(4));
    }

    #[test]
    fn test_rate_limited_retry_waits_for_reset() {
        struct Delays(std::cell::RefCell<Vec<Duration>>);
        impl RetryCallback for Delays {
            fn on_retry(&self, _: u32, _: u32, _: &RemoteError, delay: Duration) {
                self.0.borrow_mut().push(delay);
            }
        }

        let delays = Delays(std::cell::RefCell::new(Vec::new()));
        let attempts = Cell::new(0);
        let result = with_retry(&fast(3), &CancelToken::new(), &delays, || {
            let current = attempts.get();
            attempts.set(current + 1);
            if current == 0 {
                Err(RemoteError::from_status(429, "slow down")
                    .with_retry_after(Duration::from_millis(20)))
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
        assert_eq!(*delays.0.borrow(), vec![Duration::from_millis(20)]);
    }

    #[test]
    fn test_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), &CancelToken::new(), &NoCallback, || {
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_non_retryable_error() {
        let attempts = Cell::new(0);
        let result: RemoteResult<()> = with_retry(&fast(3), &CancelToken::new(), &NoCallback, || {
            attempts.set(attempts.get() + 1);
            Err(RemoteError::not_found("missing"))
        });
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_eventual_success() {
        let attempts = Cell::new(0);
        let result = with_retry(&fast(3), &CancelToken::new(), &NoCallback, || {
            let current = attempts.get();
            attempts.set(current + 1);
            if current < 2 {
                Err(RemoteError::from_status(502, "bad gateway"))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_all_attempts_fail() {
        let attempts = Cell::new(0);
        let result: RemoteResult<()> = with_retry(&fast(3), &CancelToken::new(), &NoCallback, || {
            attempts.set(attempts.get() + 1);
            Err(RemoteError::from_status(429, "slow down"))
        });
        assert_eq!(result.unwrap_err().kind, RemoteErrorKind::RateLimited);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_retry_if_narrows_retryable_errors() {
        let attempts = Cell::new(0);
        let result: RemoteResult<()> = with_retry_if(
            &fast(3),
            &CancelToken::new(),
            &NoCallback,
            |e| e.kind == RemoteErrorKind::RateLimited,
            || {
                attempts.set(attempts.get() + 1);
                Err(RemoteError::from_status(502, "bad gateway"))
            },
        );
        assert_eq!(result.unwrap_err().kind, RemoteErrorKind::Network);
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_callback_invoked_between_attempts() {
        struct Counting(Cell<u32>);
        impl RetryCallback for Counting {
            fn on_retry(&self, _: u32, _: u32, _: &RemoteError, _: Duration) {
                self.0.set(self.0.get() + 1);
            }
        }

        let callback = Counting(Cell::new(0));
        let _: RemoteResult<()> = with_retry(&fast(3), &CancelToken::new(), &callback, || {
            Err(RemoteError::from_status(500, "boom"))
        });
        assert_eq!(callback.0.get(), 2);
    }

    #[test]
    fn test_cancel_stops_retrying() {
        let cancel = CancelToken::new();
        let attempts = Cell::new(0);
        let config = RetryConfig {
            base_delay: Duration::from_secs(30),
            ..fast(5)
        };
        let result: RemoteResult<()> = with_retry(&config, &cancel, &NoCallback, || {
            attempts.set(attempts.get() + 1);
            cancel.cancel();
            Err(RemoteError::from_status(503, "unavailable"))
        });
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(attempts.get(), 1);
    }
}

//! Bounded retry with exponential backoff for API calls

use std::time::Duration;

/// Errors that know whether repeating the same request can help.
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

/// How often and how patiently a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = try once)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay: Duration,
}

/// Upper bound for a single backoff sleep
const MAX_DELAY: Duration = Duration::from_secs(300);

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Exponential backoff: base * 2^(attempt - 1), capped at 5 minutes
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

/// Retry a fallible request with exponential backoff.
///
/// Retryable errors are logged and retried up to `policy.max_retries` times.
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion or on
/// the first non-retryable error (which is returned untouched for the caller
/// to classify).
pub fn retry_with_backoff<T, E: Retryable>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt_fn: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff_duration(attempt);
                log::warn!(
                    "{label}: attempt {attempt}/{} failed: {e}, retrying in {delay:?}",
                    policy.max_retries
                );
                std::thread::sleep(delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    log::error!("{label}: failed permanently after {attempt} retries: {e}");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct TestError(bool);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable={})", self.0)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    const FAST: RetryPolicy = RetryPolicy::new(3, Duration::ZERO);

    #[test]
    fn backoff_exponential() {
        let p = RetryPolicy::new(5, Duration::from_secs(2));
        assert_eq!(p.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(p.backoff_duration(2), Duration::from_secs(4));
        assert_eq!(p.backoff_duration(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_capped() {
        let p = RetryPolicy::new(50, Duration::from_secs(2));
        assert_eq!(p.backoff_duration(40), MAX_DELAY);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = retry_with_backoff("test", &FAST, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(TestError(true))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_with_backoff("test", &FAST, || {
            calls.set(calls.get() + 1);
            Err(TestError(true))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 4); // first attempt + 3 retries
    }

    #[test]
    fn non_retryable_returns_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_with_backoff("test", &FAST, || {
            calls.set(calls.get() + 1);
            Err(TestError(false))
        });
        assert!(!result.unwrap_err().is_retryable());
        assert_eq!(calls.get(), 1);
    }
}

//! Bounded retries for transient server failures.
//!
//! A request that fails with a 5xx status is repeated, up to
//! [`MAX_ATTEMPTS`] attempts in total, before the failure is surfaced as
//! [`Error::UnexpectedServerError`]. The [`RetryStrategy`] only decides how long
//! to pause between attempts; once it has no delay left, attempts continue
//! without a pause.

use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Hard bound on attempts per request, first attempt included.
pub const MAX_ATTEMPTS: usize = 3;

/// Defines how long to wait between attempts.
///
/// # Examples
///
/// ```
/// use petfinder_client::RetryStrategy;
/// use std::time::Duration;
///
/// // Exponential backoff: 100ms, 200ms
/// let exponential = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(5),
///     max_retries: 2,
///     jitter: true,
/// };
///
/// // Linear backoff: 1s, 1s
/// let linear = RetryStrategy::Linear {
///     delay: Duration::from_secs(1),
///     max_retries: 2,
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry without pausing.
    None,

    /// Retry with exponentially increasing delays.
    ///
    /// Each retry waits for `initial_delay * 2^(attempt - 1)` (capped at `max_delay`).
    ExponentialBackoff {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// The maximum number of retries.
        max_retries: usize,
        /// Whether to scale each delay by a random factor in `[0.5, 1.0]`.
        jitter: bool,
    },

    /// Retry with a fixed delay between attempts.
    Linear {
        /// The delay between attempts.
        delay: Duration,
        /// The maximum number of retries.
        max_retries: usize,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            max_retries: MAX_ATTEMPTS - 1,
            jitter: true,
        }
    }
}

impl RetryStrategy {
    /// Returns the delay before the given retry, or `None` if retries are exhausted.
    ///
    /// `attempt` is the number of the attempt that just failed (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if attempt > *max_retries {
                    return None;
                }

                let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                let delay = initial_delay
                    .saturating_mul(2u32.saturating_pow(exponent))
                    .min(*max_delay);

                if *jitter {
                    let factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(factor))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear { delay, max_retries } => {
                (attempt <= *max_retries).then_some(*delay)
            }
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the attempt bound is hit.
///
/// Only [`Error::is_retryable`] failures are repeated. The returned count is the
/// number of attempts used; on exhaustion the last server error is returned
/// with its `attempts` field set.
pub(crate) async fn retry_transient<T, F, Fut>(
    strategy: &RetryStrategy,
    mut operation: F,
) -> Result<(T, usize)>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };

        if attempt >= MAX_ATTEMPTS {
            return Err(match error {
                Error::UnexpectedServerError {
                    status, message, ..
                } => Error::UnexpectedServerError {
                    status,
                    attempts: attempt,
                    message,
                },
                other => other,
            });
        }

        let delay = strategy
            .delay_for_attempt(attempt)
            .unwrap_or(Duration::ZERO);
        tracing::warn!(
            error = %error,
            attempt = attempt,
            delay_ms = delay.as_millis(),
            "Transient server error, retrying"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn server_error() -> Error {
        Error::UnexpectedServerError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            attempts: 1,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            max_retries: 3,
            jitter: false,
        };

        assert_eq!(
            strategy.delay_for_attempt(1),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            strategy.delay_for_attempt(2),
            Some(Duration::from_millis(200))
        );
        assert_eq!(
            strategy.delay_for_attempt(3),
            Some(Duration::from_millis(300))
        );
        assert_eq!(strategy.delay_for_attempt(4), None);
    }

    #[test]
    fn test_linear_and_none() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_secs(1),
            max_retries: 1,
        };
        assert_eq!(strategy.delay_for_attempt(1), Some(Duration::from_secs(1)));
        assert_eq!(strategy.delay_for_attempt(2), None);
        assert_eq!(RetryStrategy::None.delay_for_attempt(1), None);
    }

    #[tokio::test]
    async fn test_retry_transient_stops_at_bound() {
        let calls = AtomicUsize::new(0);
        let strategy = RetryStrategy::Linear {
            delay: Duration::ZERO,
            max_retries: 10,
        };

        let result: Result<((), usize)> = retry_transient(&strategy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
        match result {
            Err(Error::UnexpectedServerError { attempts, .. }) => {
                assert_eq!(attempts, MAX_ATTEMPTS)
            }
            other => panic!("Expected UnexpectedServerError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_strategy_without_retries_still_makes_every_attempt() {
        for strategy in [
            RetryStrategy::None,
            RetryStrategy::Linear {
                delay: Duration::from_secs(60),
                max_retries: 0,
            },
        ] {
            let calls = AtomicUsize::new(0);

            let (value, attempts) = retry_transient(&strategy, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < MAX_ATTEMPTS {
                        Err(server_error())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await
            .unwrap();

            assert_eq!(value, "ok");
            assert_eq!(attempts, MAX_ATTEMPTS);
            assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
        }
    }

    #[tokio::test]
    async fn test_retry_transient_recovers() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::ZERO,
            max_retries: 2,
        };

        let (value, attempts) = retry_transient(&strategy, |attempt| async move {
            if attempt < 3 {
                Err(server_error())
            } else {
                Ok(attempt * 10)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 30);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);

        let result: Result<((), usize)> = retry_transient(&RetryStrategy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::ResourceNotFound {
                    message: "missing".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(Error::ResourceNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

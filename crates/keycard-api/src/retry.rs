//! Backoff schedule for permission fetches.

use std::time::Duration;

use keycard_types::ApiError;
use rand::Rng;

/// Retry policy for transient permission API failures.
///
/// Retries are off by default: a failed fetch fails closed and the consumer
/// re-triggers the lookup. When enabled, the summed waits of one fetch never
/// exceed `budget`, so a struggling upstream still yields a decision promptly.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retry attempts after the first request (0 = none).
    pub max_retries: u32,
    /// Upper bound of the first backoff window; doubled per retry.
    pub base_delay: Duration,
    /// Cap on any single wait, including a server `Retry-After`.
    pub max_delay: Duration,
    /// Cap on the summed waits of one fetch.
    pub budget: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            budget: Duration::from_secs(5),
        }
    }
}

/// Transient failures only. Auth, forbidden, bad-request and decode errors
/// give the same answer on a second attempt.
pub fn is_retryable(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::RateLimited { .. }
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout
    )
}

/// Retry state for a single fetch.
#[derive(Debug)]
pub(crate) struct Backoff<'a> {
    config: &'a RetryConfig,
    retries: u32,
    waited: Duration,
}

impl<'a> Backoff<'a> {
    pub(crate) fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            retries: 0,
            waited: Duration::ZERO,
        }
    }

    /// Retries granted so far.
    pub(crate) fn retries(&self) -> u32 {
        self.retries
    }

    /// How long to wait before retrying after `error`, or `None` to give up.
    ///
    /// A `Retry-After` longer than `max_delay` gives up immediately instead of
    /// holding every waiter of the fetch behind a rate limit.
    pub(crate) fn next_delay(&mut self, error: &ApiError) -> Option<Duration> {
        if !is_retryable(error) || self.retries >= self.config.max_retries {
            return None;
        }

        let delay = match error {
            ApiError::RateLimited {
                retry_after_ms: Some(ms),
            } => {
                let requested = Duration::from_millis(*ms);
                if requested > self.config.max_delay {
                    return None;
                }
                requested
            }
            _ => full_jitter(self.window()),
        };
        if self.waited + delay > self.config.budget {
            return None;
        }

        self.retries += 1;
        self.waited += delay;
        Some(delay)
    }

    fn window(&self) -> Duration {
        let factor = 1u32 << self.retries.min(16);
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }
}

/// Uniform wait in `0..=window`.
fn full_jitter(window: Duration) -> Duration {
    let max_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(800),
            budget: Duration::from_secs(10),
        }
    }

    fn unavailable() -> ApiError {
        ApiError::Server {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[test]
    fn default_config_disables_retries() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 0);
        assert!(Backoff::new(&config).next_delay(&ApiError::Timeout).is_none());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(is_retryable(&ApiError::RateLimited {
            retry_after_ms: None,
        }));
        assert!(is_retryable(&unavailable()));
        assert!(is_retryable(&ApiError::Network("reset".into())));
        assert!(is_retryable(&ApiError::Timeout));
    }

    #[test]
    fn auth_and_decode_errors_are_not_retryable() {
        let config = enabled(3);
        let mut backoff = Backoff::new(&config);
        for error in [
            ApiError::Auth {
                message: "expired".into(),
            },
            ApiError::Forbidden {
                message: "nope".into(),
            },
            ApiError::Decode("bad json".into()),
        ] {
            assert!(!is_retryable(&error));
            assert!(backoff.next_delay(&error).is_none());
        }
        assert_eq!(backoff.retries(), 0);
    }

    #[test]
    fn window_doubles_up_to_max_delay() {
        let config = enabled(10);
        let mut backoff = Backoff::new(&config);
        let mut windows = Vec::new();
        for _ in 0..5 {
            windows.push(backoff.window());
            assert!(backoff.next_delay(&unavailable()).is_some());
        }
        assert_eq!(
            windows,
            [100, 200, 400, 800, 800].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn jittered_delay_stays_inside_window() {
        let config = enabled(1);
        let delay = Backoff::new(&config).next_delay(&unavailable()).unwrap();
        assert!(delay <= Duration::from_millis(100), "delay={delay:?}");
        assert_eq!(full_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn stops_after_max_retries() {
        let config = enabled(2);
        let mut backoff = Backoff::new(&config);
        assert!(backoff.next_delay(&ApiError::Timeout).is_some());
        assert!(backoff.next_delay(&ApiError::Timeout).is_some());
        assert!(backoff.next_delay(&ApiError::Timeout).is_none());
        assert_eq!(backoff.retries(), 2);
    }

    #[test]
    fn retry_after_is_honoured_within_max_delay() {
        let config = enabled(3);
        let mut backoff = Backoff::new(&config);
        let limited = ApiError::RateLimited {
            retry_after_ms: Some(500),
        };
        assert_eq!(backoff.next_delay(&limited), Some(Duration::from_millis(500)));
    }

    #[test]
    fn long_retry_after_gives_up() {
        let config = enabled(3);
        let limited = ApiError::RateLimited {
            retry_after_ms: Some(30_000),
        };
        assert!(Backoff::new(&config).next_delay(&limited).is_none());
    }

    #[test]
    fn budget_caps_total_wait() {
        let config = RetryConfig {
            budget: Duration::from_millis(900),
            ..enabled(5)
        };
        let limited = ApiError::RateLimited {
            retry_after_ms: Some(400),
        };
        let mut backoff = Backoff::new(&config);
        assert!(backoff.next_delay(&limited).is_some());
        assert!(backoff.next_delay(&limited).is_some());
        // 800ms spent; another 400ms would exceed the budget.
        assert!(backoff.next_delay(&limited).is_none());
        assert_eq!(backoff.retries(), 2);
    }
}

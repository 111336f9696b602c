use std::{sync::Arc, time::Duration};

use rand::{thread_rng, Rng};

/// Produces delays between retries of a failed request.
pub trait BackoffController: Send {
    /// Delay before the next attempt.
    fn backoff(&mut self) -> Duration;
    fn reset(&mut self);
}

/// Creates a fresh [`BackoffController`] for every retried batch.
pub type BackoffProvider = Arc<dyn Fn() -> Box<dyn BackoffController> + Send + Sync>;

/// Doubles the delay after each attempt, up to `max`, and adds random jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    max_jitter: Duration,
    current: Duration,
}

impl ExponentialBackoff {
    pub const DEFAULT_BASE: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX: Duration = Duration::from_secs(32);
    pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

    pub fn new(base: Duration, max: Duration, max_jitter: Duration) -> ExponentialBackoff {
        ExponentialBackoff {
            base,
            max,
            max_jitter,
            current: base,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> ExponentialBackoff {
        ExponentialBackoff::new(
            ExponentialBackoff::DEFAULT_BASE,
            ExponentialBackoff::DEFAULT_MAX,
            ExponentialBackoff::DEFAULT_MAX_JITTER,
        )
    }
}

impl BackoffController for ExponentialBackoff {
    fn backoff(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay + jitter(self.max_jitter)
    }

    fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Always waits the same amount of time.
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff(pub Duration);

impl BackoffController for ConstantBackoff {
    fn backoff(&mut self) -> Duration {
        self.0
    }

    fn reset(&mut self) {}
}

/// Random duration in `[0, max]`.
fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    thread_rng().gen_range(Duration::ZERO..=max)
}

/// How failed event batches are retried.
#[derive(Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. A batch is attempted at most `max_retries + 1` times.
    pub max_retries: u32,
    pub backoff_provider: BackoffProvider,
}

impl RetryConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;

    pub fn new(max_retries: u32, backoff_provider: BackoffProvider) -> RetryConfig {
        RetryConfig {
            max_retries,
            backoff_provider,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> RetryConfig {
        self.max_retries = max_retries;
        self
    }

    pub fn with_constant_backoff(mut self, delay: Duration) -> RetryConfig {
        self.backoff_provider = Arc::new(move || -> Box<dyn BackoffController> {
            Box::new(ConstantBackoff(delay))
        });
        self
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> RetryConfig {
        RetryConfig::new(
            RetryConfig::DEFAULT_MAX_RETRIES,
            Arc::new(|| -> Box<dyn BackoffController> {
                Box::new(ExponentialBackoff::default())
            }),
        )
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{BackoffController, ExponentialBackoff, RetryConfig};

    #[test]
    fn exponential_backoff_doubles_up_to_max() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(8),
            Duration::ZERO,
        );
        let delays: Vec<_> = (0..6).map(|_| backoff.backoff().as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8, 8, 8]);

        backoff.reset();
        assert_eq!(backoff.backoff(), Duration::from_secs(1));
    }

    #[test]
    fn jitter_is_bounded() {
        let mut backoff = ExponentialBackoff::default();
        for expected in [1, 2, 4, 8, 16, 32, 32] {
            let delay = backoff.backoff();
            let base = Duration::from_secs(expected);
            assert!(delay >= base, "{delay:?} < {base:?}");
            assert!(delay <= base + Duration::from_millis(500), "{delay:?}");
        }
    }

    #[test]
    fn default_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_attempts(), 6);

        let mut backoff = (config.backoff_provider)();
        assert!(backoff.backoff() >= Duration::from_secs(1));
    }

    #[test]
    fn constant_backoff() {
        let config = RetryConfig::default().with_constant_backoff(Duration::from_millis(10));
        let mut backoff = (config.backoff_provider)();
        assert_eq!(backoff.backoff(), Duration::from_millis(10));
        assert_eq!(backoff.backoff(), Duration::from_millis(10));
    }
}

use std::time::Duration;

use rand::Rng;

use super::config::FetchConfig;

/// Per-engine retry budget and exponential backoff with jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts on one engine before escalating (including the first).
    pub max_retries_per_engine: u32,
    pub base_delay: Duration,
    /// Upper bound on any backoff delay.
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries_per_engine: config.max_retries_per_engine,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            max_jitter: Duration::from_millis(config.retry_max_jitter_ms),
        }
    }

    /// Policy without sleeping, for tests.
    pub fn immediate(max_retries_per_engine: u32) -> Self {
        Self {
            max_retries_per_engine,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Delay after the 0-based `attempt` failed.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_delay_with(attempt, &mut rand::thread_rng())
    }

    /// `min(max_delay, base * 2^attempt + jitter)`, jitter uniform in
    /// `[0, min(max_jitter, base * 2^attempt))`.
    ///
    /// Capping the jitter by the exponential term keeps the sequence
    /// non-decreasing.
    pub fn backoff_delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exp = 1u32 << attempt.min(16);
        let raw = self.base_delay.saturating_mul(exp);
        let jitter_cap = raw.min(self.max_jitter);
        let jitter = if jitter_cap.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(rng.gen_range(0.0..jitter_cap.as_secs_f64()))
        };
        raw.saturating_add(jitter).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries_per_engine, 2);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.max_jitter, Duration::from_secs(1));
    }

    #[test]
    fn test_delay_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let d0 = policy.backoff_delay_with(0, &mut rng);
            assert!(d0 >= Duration::from_secs(2) && d0 < Duration::from_secs(3));
            let d1 = policy.backoff_delay_with(1, &mut rng);
            assert!(d1 >= Duration::from_secs(4) && d1 < Duration::from_secs(5));
        }
    }

    #[test]
    fn test_delays_are_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(60));
    }

    #[test]
    fn test_delays_non_decreasing() {
        // small base so the jitter cap is the exponential term itself
        let policy = RetryPolicy {
            max_retries_per_engine: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            max_jitter: Duration::from_secs(1),
        };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut previous = Duration::ZERO;
            for attempt in 0..12 {
                let delay = policy.backoff_delay_with(attempt, &mut rng);
                assert!(delay >= previous, "attempt {} went backwards", attempt);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_immediate_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff_delay(0), Duration::ZERO);
        assert_eq!(policy.backoff_delay(5), Duration::ZERO);
    }
}

//! Bounded exponential backoff with full jitter

use keyway_common::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Retry policy for unprocessed batch entries
///
/// The delay before retry `n` (zero-based) is drawn uniformly from
/// `[0, min(max_delay, base_delay * 2^n)]`, or is exactly the upper bound
/// when jitter is disabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a jittered policy
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter: true,
        }
    }

    /// Build from configuration
    #[must_use]
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter,
        }
    }

    /// Disable jitter (deterministic delays)
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Maximum number of re-issues after the first attempt
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound of the delay before retry `retry`
    #[must_use]
    pub fn delay_ceiling(&self, retry: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    /// Delay to sleep before retry `retry`
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let ceiling = self.delay_ceiling(retry);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_ceiling() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), Duration::from_millis(100));
        assert_eq!(policy.delay_ceiling(0), Duration::from_millis(10));
        assert_eq!(policy.delay_ceiling(1), Duration::from_millis(20));
        assert_eq!(policy.delay_ceiling(3), Duration::from_millis(80));
        assert_eq!(policy.delay_ceiling(4), Duration::from_millis(100));
        assert_eq!(policy.delay_ceiling(200), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_ceiling() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), Duration::from_millis(100));
        for retry in 0..8 {
            for _ in 0..50 {
                assert!(policy.delay(retry) <= policy.delay_ceiling(retry));
            }
        }
    }

    #[test]
    fn test_without_jitter_is_deterministic() {
        let policy = RetryPolicy::new(3, Duration::from_millis(5), Duration::from_secs(1))
            .without_jitter();
        assert_eq!(policy.delay(2), Duration::from_millis(20));
        assert_eq!(policy.max_retries(), 3);
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 4,
            jitter: false,
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries(), 2);
        assert_eq!(policy.delay(5), Duration::from_millis(4));
    }
}

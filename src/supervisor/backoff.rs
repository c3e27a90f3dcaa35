//! Exponential backoff bounded by a total elapsed-time budget.
//!
//! The delay for retry `n` is `initial × multiplier^n`, clamped to
//! `max_interval`. The base is derived from the attempt number alone, so
//! delays never drift.

use std::time::Duration;

use crate::types::PropagationConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Cap for a single delay.
    pub max_interval: Duration,
    /// Multiplicative growth factor (`>= 1.0` expected).
    pub multiplier: f64,
    /// Budget across all attempts and delays.
    pub max_elapsed: Duration,
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (0-indexed).
    pub fn delay(&self, retry: u32) -> Duration {
        let max_secs = self.max_interval.as_secs_f64();
        let exp = retry.min(i32::MAX as u32) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max_interval
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay before the next retry, or `None` when sleeping it would overrun
    /// the budget given `elapsed` time already spent.
    pub fn next_delay(&self, retry: u32, elapsed: Duration) -> Option<Duration> {
        let delay = self.delay(retry);
        if elapsed.saturating_add(delay) > self.max_elapsed {
            None
        } else {
            Some(delay)
        }
    }
}

impl From<&PropagationConfig> for BackoffPolicy {
    fn from(config: &PropagationConfig) -> Self {
        Self {
            initial: config.initial_interval,
            max_interval: config.max_interval,
            multiplier: config.multiplier,
            max_elapsed: config.max_elapsed,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&PropagationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_and_cap() {
        let policy = BackoffPolicy {
            initial: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_elapsed: Duration::from_secs(10),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_budget_stops_retries() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.next_delay(0, Duration::ZERO),
            Some(Duration::from_millis(500))
        );
        assert_eq!(policy.next_delay(0, Duration::from_millis(4600)), None);
        assert_eq!(
            policy.next_delay(1, Duration::from_millis(4000)),
            Some(Duration::from_millis(750))
        );
    }
}

//! Exponential backoff for queue redeliveries.

use std::time::Duration;

/// Redelivery policy: base delay doubling per delivery, capped, with a
/// maximum number of deliveries before the payload is dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total deliveries allowed, including the first.
    pub max_attempts: u32,
    /// Delay before the second delivery.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after `delivery` (1-based) failed.
    pub fn delay_for(&self, delivery: u32) -> Duration {
        let exponent = delivery.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(2u32.pow(exponent));
        delay.min(self.max_delay)
    }

    /// Whether a failure on `delivery` exhausts the policy.
    pub fn should_dead_letter(&self, delivery: u32) -> bool {
        delivery >= self.max_attempts
    }
}

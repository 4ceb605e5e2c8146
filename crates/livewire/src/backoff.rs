//! Exponential reconnect backoff schedule.

use std::time::Duration;

/// Doubling delay schedule with a hard attempt ceiling. After the ceiling
/// the distributor settles into polling instead of retrying further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect `attempt`, counted from one.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
    }

    /// Delay before the final permitted attempt.
    pub fn max_delay(&self) -> Duration {
        self.delay_for(self.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delays_double_per_attempt() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(16));
        assert_eq!(policy.max_delay(), Duration::from_secs(16));
    }

    #[test]
    fn test_custom_base_delay() {
        let policy = ReconnectPolicy::new(Duration::from_millis(10), 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
    }

    #[test]
    fn test_large_attempt_counts_saturate() {
        let policy = ReconnectPolicy::new(Duration::from_secs(1), u32::MAX);
        // Must not panic on overflow.
        let delay = policy.delay_for(u32::MAX);
        assert!(delay >= Duration::from_secs(1));
    }
}

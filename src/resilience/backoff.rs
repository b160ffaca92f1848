//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::schema::ForwardingConfig;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    pub fn from_config(config: &ForwardingConfig) -> Self {
        Self::new(config.retry_base_delay_ms, config.retry_max_delay_ms)
    }

    /// Delay before retry number `attempt` (1-based); zero for attempt 0.
    ///
    /// `base * 2^(attempt-1)`, capped at `max`, plus up to 10% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential = 2u64.saturating_pow(attempt - 1);
        let capped = self.base_ms.saturating_mul(exponential).min(self.max_ms);

        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = Backoff::new(100, 1000);
        assert_eq!(backoff.delay(0), Duration::ZERO);

        let d1 = backoff.delay(1).as_millis();
        assert!((100..110).contains(&d1));

        let d2 = backoff.delay(2).as_millis();
        assert!((200..220).contains(&d2));

        let capped = backoff.delay(30).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_zero_base_never_sleeps() {
        assert_eq!(Backoff::new(0, 1000).delay(3), Duration::ZERO);
    }
}

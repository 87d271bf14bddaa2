use std::time::Duration;

/// Inter-cycle delay: `base × min(consecutive_errors + 1, max_multiplier)`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_multiplier: u32,
    consecutive_errors: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_multiplier: u32) -> Self {
        Self {
            base,
            max_multiplier: max_multiplier.max(1),
            consecutive_errors: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        let multiplier = self
            .consecutive_errors
            .saturating_add(1)
            .min(self.max_multiplier);
        self.base * multiplier
    }

    pub fn record_failure(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_to_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(5), 12);
        assert_eq!(backoff.delay(), Duration::from_secs(5));

        let mut previous = backoff.delay();
        for _ in 0..11 {
            backoff.record_failure();
            assert!(backoff.delay() > previous);
            previous = backoff.delay();
        }
        assert_eq!(backoff.delay(), Duration::from_secs(60));

        for _ in 0..5 {
            backoff.record_failure();
            assert_eq!(backoff.delay(), Duration::from_secs(60));
        }

        backoff.record_success();
        assert_eq!(backoff.consecutive_errors(), 0);
        assert_eq!(backoff.delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_multiplier_still_waits_base() {
        let mut backoff = Backoff::new(Duration::from_secs(5), 0);
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_secs(5));
    }
}

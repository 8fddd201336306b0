// Reopen backoff - exponential delays between attempts to open a host port

use std::time::{Duration, Instant};

pub struct ReconnectionStrategy {
    base_delay: Duration,
    max_delay: Duration,
    current_attempt: u32,
    next_attempt_at: Option<Instant>,
}

impl ReconnectionStrategy {
    pub fn new() -> Self {
        Self::with_delays(Duration::from_millis(1000), Duration::from_millis(30_000))
    }

    pub fn with_delays(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            current_attempt: 0,
            next_attempt_at: None,
        }
    }

    /// Delay before the next attempt: base * 2^attempt, capped
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.current_attempt).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        self.current_attempt = self.current_attempt.saturating_add(1);
        delay
    }

    /// True when `now` is past the scheduled attempt, or none was scheduled.
    /// Attempts never stop; the delay stays at its cap.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_attempt_at.is_none_or(|at| now >= at)
    }

    /// Record a failed attempt and schedule the following one
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let delay = self.next_delay();
        self.next_attempt_at = Some(now + delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
        self.next_attempt_at = None;
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ReconnectionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let mut strategy = ReconnectionStrategy::new();
        assert_eq!(strategy.next_delay(), Duration::from_millis(1000));
        assert_eq!(strategy.next_delay(), Duration::from_millis(2000));
        assert_eq!(strategy.next_delay(), Duration::from_millis(4000));
        assert_eq!(strategy.next_delay(), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_capped() {
        let mut strategy = ReconnectionStrategy::new();
        for _ in 0..40 {
            assert!(strategy.next_delay() <= Duration::from_millis(30_000));
        }
        assert_eq!(strategy.next_delay(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_failure_schedules_next_attempt() {
        let mut strategy = ReconnectionStrategy::new();
        let now = Instant::now();
        assert!(strategy.is_due(now));

        let delay = strategy.record_failure(now);
        assert!(!strategy.is_due(now));
        assert!(strategy.is_due(now + delay));

        strategy.reset();
        assert_eq!(strategy.current_attempt(), 0);
        assert!(strategy.is_due(now));
    }
}

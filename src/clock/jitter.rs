// Jitter statistics for externally received clock ticks

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const NO_ARRIVAL: u64 = u64::MAX;

/// Inter-arrival statistics, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JitterSnapshot {
    pub last_interval_us: u32,
    /// `None` until two ticks have been received
    pub min_interval_us: Option<u32>,
    pub max_interval_us: u32,
    pub samples: u32,
}

impl JitterSnapshot {
    /// Spread between the slowest and fastest interval
    pub fn spread_us(&self) -> u32 {
        self.min_interval_us
            .map(|min| self.max_interval_us.saturating_sub(min))
            .unwrap_or(0)
    }
}

/// Lock-free jitter tracker written by the input path
#[derive(Debug)]
pub struct JitterStats {
    last_arrival_us: AtomicU64,
    last_interval_us: AtomicU32,
    min_interval_us: AtomicU32,
    max_interval_us: AtomicU32,
    samples: AtomicU32,
}

impl JitterStats {
    pub fn new() -> Self {
        Self {
            last_arrival_us: AtomicU64::new(NO_ARRIVAL),
            last_interval_us: AtomicU32::new(0),
            min_interval_us: AtomicU32::new(u32::MAX),
            max_interval_us: AtomicU32::new(0),
            samples: AtomicU32::new(0),
        }
    }

    pub fn record(&self, now_us: u64) {
        let previous = self.last_arrival_us.swap(now_us, Ordering::Relaxed);
        if previous != NO_ARRIVAL {
            let interval = now_us.saturating_sub(previous).min(u32::MAX as u64 - 1) as u32;
            self.last_interval_us.store(interval, Ordering::Relaxed);
            self.min_interval_us.fetch_min(interval, Ordering::Relaxed);
            self.max_interval_us.fetch_max(interval, Ordering::Relaxed);
        }
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JitterSnapshot {
        let min = self.min_interval_us.load(Ordering::Relaxed);
        JitterSnapshot {
            last_interval_us: self.last_interval_us.load(Ordering::Relaxed),
            min_interval_us: (min != u32::MAX).then_some(min),
            max_interval_us: self.max_interval_us.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.last_arrival_us.store(NO_ARRIVAL, Ordering::Relaxed);
        self.last_interval_us.store(0, Ordering::Relaxed);
        self.min_interval_us.store(u32::MAX, Ordering::Relaxed);
        self.max_interval_us.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
    }
}

impl Default for JitterStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_has_no_interval() {
        let stats = JitterStats::new();
        stats.record(0);
        let snap = stats.snapshot();
        assert_eq!(snap.samples, 1);
        assert_eq!(snap.min_interval_us, None);
        assert_eq!(snap.last_interval_us, 0);
    }

    #[test]
    fn test_min_max_last() {
        let stats = JitterStats::new();
        stats.record(1_000);
        stats.record(21_000);
        stats.record(41_500);
        stats.record(61_000);

        let snap = stats.snapshot();
        assert_eq!(snap.samples, 4);
        assert_eq!(snap.min_interval_us, Some(19_500));
        assert_eq!(snap.max_interval_us, 20_500);
        assert_eq!(snap.last_interval_us, 19_500);
        assert_eq!(snap.spread_us(), 1_000);
    }

    #[test]
    fn test_reset() {
        let stats = JitterStats::new();
        stats.record(10);
        stats.record(30);
        stats.reset();
        assert_eq!(stats.snapshot(), JitterSnapshot::default());
    }
}

// Pending real-time state - handoff from the timer/input path to the clock worker

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Low 32 bits: pending tick count. High bits: transport flags.
const TICK_MASK: u64 = 0xFFFF_FFFF;
const FLAG_START: u64 = 1 << 32;
const FLAG_STOP: u64 = 1 << 33;
const FLAG_CONTINUE: u64 = 1 << 34;
const FLAG_RESET: u64 = 1 << 35;
// Set by stop, cleared by start/continue: the later of the two transitions
const FLAG_STOP_LAST: u64 = 1 << 36;

/// Everything that was pending at the time of a drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drained {
    pub ticks: u32,
    pub start: bool,
    pub stop: bool,
    pub resume: bool,
    pub reset: bool,
    /// Stop was marked after the last start/continue
    pub stop_last: bool,
}

impl Drained {
    fn from_word(word: u64) -> Self {
        Self {
            ticks: (word & TICK_MASK) as u32,
            start: word & FLAG_START != 0,
            stop: word & FLAG_STOP != 0,
            resume: word & FLAG_CONTINUE != 0,
            reset: word & FLAG_RESET != 0,
            stop_last: word & FLAG_STOP_LAST != 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ticks == 0 && !self.start && !self.stop && !self.resume && !self.reset
    }
}

/// Single-producer/single-consumer pending counter plus wake signal.
///
/// The producer side (`mark_*`) is a single atomic RMW followed by a
/// non-blocking `try_send`, so it is safe to call from a timer callback.
/// The consumer reads and clears everything with one `swap`.
pub struct PendingRealtime {
    word: AtomicU64,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl PendingRealtime {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            word: AtomicU64::new(0),
            wake_tx,
            wake_rx,
        }
    }

    pub fn mark_tick(&self) {
        self.word.fetch_add(1, Ordering::AcqRel);
        self.wake();
    }

    pub fn mark_start(&self) {
        self.mark(FLAG_START, FLAG_STOP_LAST);
    }

    pub fn mark_stop(&self) {
        self.mark(FLAG_STOP | FLAG_STOP_LAST, 0);
    }

    pub fn mark_continue(&self) {
        self.mark(FLAG_CONTINUE, FLAG_STOP_LAST);
    }

    pub fn mark_reset(&self) {
        self.mark(FLAG_RESET, 0);
    }

    /// Sets `set` and clears `clear` in one atomic update
    fn mark(&self, set: u64, clear: u64) {
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some((word | set) & !clear)
            });
        self.wake();
    }

    fn wake(&self) {
        // A full channel already holds a wake-up
        let _ = self.wake_tx.try_send(());
    }

    /// Read-and-clear of every pending field
    pub fn take(&self) -> Drained {
        Drained::from_word(self.word.swap(0, Ordering::AcqRel))
    }

    /// Ticks waiting to be drained
    pub fn pending_ticks(&self) -> u32 {
        (self.word.load(Ordering::Acquire) & TICK_MASK) as u32
    }

    /// Block until something was marked or the timeout elapsed
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl Default for PendingRealtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_everything() {
        let pending = PendingRealtime::new();
        pending.mark_tick();
        pending.mark_tick();
        pending.mark_start();

        let drained = pending.take();
        assert_eq!(drained.ticks, 2);
        assert!(drained.start);
        assert!(!drained.stop);

        assert!(pending.take().is_empty());
    }

    #[test]
    fn test_flags_are_independent() {
        let pending = PendingRealtime::new();
        pending.mark_stop();
        pending.mark_reset();
        pending.mark_continue();

        let drained = pending.take();
        assert_eq!(drained.ticks, 0);
        assert!(drained.stop && drained.reset && drained.resume);
        assert!(!drained.start);
    }

    #[test]
    fn test_last_transition_is_remembered() {
        let pending = PendingRealtime::new();
        pending.mark_stop();
        pending.mark_start();
        let drained = pending.take();
        assert!(drained.start && drained.stop);
        assert!(!drained.stop_last);

        pending.mark_start();
        pending.mark_stop();
        let drained = pending.take();
        assert!(drained.start && drained.stop);
        assert!(drained.stop_last);

        pending.mark_stop();
        pending.mark_continue();
        assert!(!pending.take().stop_last);
    }

    #[test]
    fn test_wait_sees_wake() {
        let pending = PendingRealtime::new();
        pending.mark_tick();
        assert!(pending.wait(Duration::from_millis(10)));
        // Wake consumed, counter still set until drained
        assert_eq!(pending.pending_ticks(), 1);
        assert!(!pending.wait(Duration::from_millis(1)));
    }
}

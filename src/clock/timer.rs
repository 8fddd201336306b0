// Master timer - periodic tick source standing in for the hardware timer

use super::engine::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time since startup
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    origin: Instant,
}

impl Uptime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    pub fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

impl Default for Uptime {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread calling `Clock::timer_tick` once per interval.
///
/// The period is re-read every cycle so tempo changes apply on the next tick.
/// Deadlines are accumulated rather than re-based on wake-up time to avoid drift.
pub struct MasterTimer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl MasterTimer {
    const IDLE_POLL: Duration = Duration::from_millis(1);

    pub fn spawn(clock: Arc<Clock>) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let handle = thread::Builder::new()
            .name("master-timer".into())
            .spawn(move || {
                let mut next_deadline: Option<Instant> = None;

                while !flag.load(Ordering::Acquire) {
                    if !clock.is_running() || clock.is_slave() {
                        next_deadline = None;
                        thread::sleep(Self::IDLE_POLL);
                        continue;
                    }

                    let period = Duration::from_micros(clock.interval_us() as u64);
                    let now = Instant::now();
                    let deadline = match next_deadline {
                        Some(deadline) => deadline,
                        None => now + period,
                    };

                    if deadline > now {
                        thread::sleep(deadline - now);
                    }

                    clock.timer_tick();

                    // Fell more than one period behind: re-anchor instead of bursting
                    let after = Instant::now();
                    let mut upcoming = deadline + period;
                    if upcoming + period < after {
                        upcoming = after + period;
                    }
                    next_deadline = Some(upcoming);
                }
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MasterTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_is_monotonic() {
        let uptime = Uptime::new();
        let a = uptime.micros();
        thread::sleep(Duration::from_millis(2));
        let b = uptime.micros();
        assert!(b > a);
        assert!(uptime.millis() >= 2);
    }

    #[test]
    fn test_timer_produces_ticks_while_running() {
        let clock = Clock::new(240.0);
        let mut timer = MasterTimer::spawn(clock.clone()).unwrap();

        clock.start();
        thread::sleep(Duration::from_millis(120));
        timer.shutdown();

        // 240 BPM is ~10.4 ms per tick
        let ticks = clock.pending().pending_ticks();
        assert!(ticks >= 3, "expected some ticks, got {}", ticks);
    }

    #[test]
    fn test_timer_silent_when_stopped() {
        let clock = Clock::new(240.0);
        let mut timer = MasterTimer::spawn(clock.clone()).unwrap();
        thread::sleep(Duration::from_millis(40));
        timer.shutdown();
        assert_eq!(clock.pending().pending_ticks(), 0);
    }
}

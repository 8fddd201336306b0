// Clock engine - shared clock handle and the worker that drains it
// The timer path only marks pending ticks; all counting happens in ClockDriver

use super::jitter::{JitterSnapshot, JitterStats};
use super::pending::{Drained, PendingRealtime};
use super::timer::Uptime;
use super::{DEFAULT_BPM, DEFAULT_TICKS_PER_STEP, interval_us};
use crate::midi::routing::{ClockIo, InputPort};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

/// Where ticks come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Internal timer
    Master,
    /// External tick bytes
    Slave,
}

impl Default for SyncMode {
    fn default() -> Self {
        SyncMode::Master
    }
}

/// Counter values after one drained tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    pub tick: u32,
    pub ppqn: u32,
    pub step: u32,
    pub step_boundary: bool,
}

/// Receives clock events from the worker, in arrival order.
///
/// Registered once with a `ClockWorker`/`ClockDriver`, invoked on every drain.
pub trait ClockListener {
    fn on_tick(&mut self, _tick: TickInfo) {}
    fn on_step_start(&mut self, _step: u32) {}
    fn on_start(&mut self) {}
    fn on_stop(&mut self) {}
    fn on_continue(&mut self) {}
}

/// Process-lifetime clock state shared between the timer, the router and the worker
pub struct Clock {
    pending: PendingRealtime,
    jitter: JitterStats,
    running: AtomicBool,
    slave: AtomicBool,
    bpm_bits: AtomicU32,
    interval_us: AtomicU32,
    clock_io: AtomicU8,
    // Mirrors published by the driver after each drain
    tick_count: AtomicU32,
    step_count: AtomicU32,
    uptime: Uptime,
}

impl Clock {
    pub fn new(bpm: f32) -> Arc<Self> {
        let clock = Self {
            pending: PendingRealtime::new(),
            jitter: JitterStats::new(),
            running: AtomicBool::new(false),
            slave: AtomicBool::new(false),
            bpm_bits: AtomicU32::new(DEFAULT_BPM.to_bits()),
            interval_us: AtomicU32::new(interval_us(DEFAULT_BPM)),
            clock_io: AtomicU8::new(ClockIo::default().bits()),
            tick_count: AtomicU32::new(0),
            step_count: AtomicU32::new(0),
            uptime: Uptime::new(),
        };
        clock.set_bpm(bpm);
        Arc::new(clock)
    }

    /// Re-initialise tempo and transport, leaving sync mode and clock I/O untouched
    pub fn begin(&self, bpm: f32) {
        self.set_bpm(bpm);
        self.running.store(false, Ordering::Release);
        self.pending.take();
        self.pending.mark_reset();
    }

    /// Non-positive or non-finite tempos are ignored
    pub fn set_bpm(&self, bpm: f32) {
        if !bpm.is_finite() || bpm <= 0.0 {
            return;
        }
        self.bpm_bits.store(bpm.to_bits(), Ordering::Relaxed);
        self.interval_us.store(interval_us(bpm), Ordering::Relaxed);
    }

    pub fn bpm(&self) -> f32 {
        f32::from_bits(self.bpm_bits.load(Ordering::Relaxed))
    }

    /// Current master timer period
    pub fn interval_us(&self) -> u32 {
        self.interval_us.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.pending.mark_start();
        }
    }

    pub fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.pending.mark_stop();
        }
    }

    /// Resume without resetting the counters
    pub fn resume(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.pending.mark_continue();
        }
    }

    /// Zero the counters on the next drain
    pub fn reset(&self) {
        self.pending.mark_reset();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_sync_mode(&self, mode: SyncMode) {
        self.slave.store(mode == SyncMode::Slave, Ordering::Release);
    }

    pub fn sync_mode(&self) -> SyncMode {
        if self.slave.load(Ordering::Acquire) {
            SyncMode::Slave
        } else {
            SyncMode::Master
        }
    }

    pub fn is_slave(&self) -> bool {
        self.sync_mode() == SyncMode::Slave
    }

    pub fn set_clock_io(&self, io: ClockIo) {
        self.clock_io.store(io.bits(), Ordering::Relaxed);
    }

    pub fn clock_io(&self) -> ClockIo {
        ClockIo::from_bits(self.clock_io.load(Ordering::Relaxed))
    }

    pub fn is_clock_source_enabled(&self, input: InputPort) -> bool {
        self.clock_io().accepts(input)
    }

    /// Hardware timer handler: no I/O, no allocation, no blocking.
    /// Ignored in Slave mode or while stopped.
    pub fn timer_tick(&self) {
        if self.slave.load(Ordering::Relaxed) {
            return;
        }
        if self.running.load(Ordering::Relaxed) {
            self.pending.mark_tick();
        }
    }

    /// External tick byte arrived
    pub fn receive_external_tick(&self) {
        self.receive_external_tick_at(self.uptime.micros());
    }

    /// Same as `receive_external_tick` with an explicit arrival time
    pub fn receive_external_tick_at(&self, now_us: u64) {
        self.jitter.record(now_us);
        // Master mode ignores external ticks beyond the statistics
        if self.is_slave() && self.is_running() {
            self.pending.mark_tick();
        }
    }

    pub fn jitter(&self) -> JitterSnapshot {
        self.jitter.snapshot()
    }

    pub fn reset_jitter_stats(&self) {
        self.jitter.reset();
    }

    /// Tick count as of the last drain
    pub fn tick_count(&self) -> u32 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// Step count as of the last drain
    pub fn step_count(&self) -> u32 {
        self.step_count.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> &PendingRealtime {
        &self.pending
    }

    pub fn uptime(&self) -> Uptime {
        self.uptime
    }

    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        self.pending.wait(timeout)
    }
}

/// Worker-side counters. Only the thread that drains the clock touches these.
pub struct ClockDriver {
    clock: Arc<Clock>,
    tick_count: u32,
    ppqn_counter: u32,
    step_counter: u32,
    ticks_per_step: u32,
}

impl ClockDriver {
    pub fn new(clock: Arc<Clock>) -> Self {
        Self::with_ticks_per_step(clock, DEFAULT_TICKS_PER_STEP)
    }

    pub fn with_ticks_per_step(clock: Arc<Clock>, ticks_per_step: u32) -> Self {
        Self {
            clock,
            tick_count: 0,
            ppqn_counter: 0,
            step_counter: 0,
            ticks_per_step: ticks_per_step.max(1),
        }
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    pub fn ppqn_counter(&self) -> u32 {
        self.ppqn_counter
    }

    pub fn step_counter(&self) -> u32 {
        self.step_counter
    }

    pub fn ticks_per_step(&self) -> u32 {
        self.ticks_per_step
    }

    /// Drain the pending state once and replay it into `listener`
    pub fn process_pending<L: ClockListener + ?Sized>(&mut self, listener: &mut L) -> Drained {
        let drained = self.clock.pending.take();
        if !drained.is_empty() {
            self.apply(drained, listener);
        }
        drained
    }

    /// Order within one drain: reset, start, continue, ticks, stop.
    /// A stop that was followed by a start or continue runs before them.
    pub fn apply<L: ClockListener + ?Sized>(&mut self, drained: Drained, listener: &mut L) {
        let stop_first = drained.stop && !drained.stop_last;
        if drained.reset {
            self.reset_counters();
        }
        if stop_first {
            listener.on_stop();
            self.reset_counters();
        }
        if drained.start {
            self.reset_counters();
            listener.on_start();
        }
        if drained.resume {
            listener.on_continue();
        }
        for _ in 0..drained.ticks {
            self.advance(listener);
        }
        if drained.stop && !stop_first {
            listener.on_stop();
            self.reset_counters();
        }
        self.publish();
    }

    fn advance<L: ClockListener + ?Sized>(&mut self, listener: &mut L) {
        self.tick_count = self.tick_count.wrapping_add(1);
        self.ppqn_counter += 1;

        let step_boundary = self.ppqn_counter >= self.ticks_per_step;
        if step_boundary {
            self.ppqn_counter = 0;
            self.step_counter = self.step_counter.wrapping_add(1);
            listener.on_step_start(self.step_counter);
        }

        listener.on_tick(TickInfo {
            tick: self.tick_count,
            ppqn: self.ppqn_counter,
            step: self.step_counter,
            step_boundary,
        });
    }

    fn reset_counters(&mut self) {
        self.tick_count = 0;
        self.ppqn_counter = 0;
        self.step_counter = 0;
    }

    fn publish(&self) {
        self.clock.tick_count.store(self.tick_count, Ordering::Release);
        self.clock.step_count.store(self.step_counter, Ordering::Release);
    }
}

/// Dedicated thread that waits for the wake signal and drains the clock
pub struct ClockWorker {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ClockWorker {
    const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

    pub fn spawn<L>(clock: Arc<Clock>, mut listener: L) -> std::io::Result<Self>
    where
        L: ClockListener + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = thread::Builder::new()
            .name("clock-worker".into())
            .spawn(move || {
                let mut driver = ClockDriver::new(clock.clone());
                while !flag.load(Ordering::Acquire) {
                    clock.wait_for_work(Self::WAIT_TIMEOUT);
                    driver.process_pending(&mut listener);
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

impl Drop for ClockWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        ticks: Vec<TickInfo>,
        steps: Vec<u32>,
        starts: u32,
        stops: u32,
        continues: u32,
        transitions: Vec<&'static str>,
    }

    impl ClockListener for Recorder {
        fn on_tick(&mut self, tick: TickInfo) {
            self.ticks.push(tick);
        }
        fn on_step_start(&mut self, step: u32) {
            self.steps.push(step);
        }
        fn on_start(&mut self) {
            self.starts += 1;
            self.transitions.push("start");
        }
        fn on_stop(&mut self) {
            self.stops += 1;
            self.transitions.push("stop");
        }
        fn on_continue(&mut self) {
            self.continues += 1;
            self.transitions.push("continue");
        }
    }

    #[test]
    fn test_timer_ticks_only_while_running() {
        let clock = Clock::new(120.0);
        clock.timer_tick();
        assert_eq!(clock.pending().pending_ticks(), 0);

        clock.start();
        clock.timer_tick();
        clock.timer_tick();
        assert_eq!(clock.pending().pending_ticks(), 2);
    }

    #[test]
    fn test_master_tick_count_after_n_drains() {
        let clock = Clock::new(120.0);
        let mut driver = ClockDriver::new(clock.clone());
        let mut recorder = Recorder::default();

        clock.start();
        driver.process_pending(&mut recorder);
        for _ in 0..30 {
            clock.timer_tick();
        }
        driver.process_pending(&mut recorder);

        assert_eq!(driver.tick_count(), 30);
        assert_eq!(recorder.ticks.len(), 30);
        assert_eq!(recorder.steps, vec![1, 2, 3, 4, 5]);
        assert_eq!(recorder.starts, 1);
        assert_eq!(clock.tick_count(), 30);
        assert_eq!(clock.step_count(), 5);
    }

    #[test]
    fn test_start_and_stop_fire_once() {
        let clock = Clock::new(120.0);
        let mut driver = ClockDriver::new(clock.clone());
        let mut recorder = Recorder::default();

        clock.start();
        clock.start();
        driver.process_pending(&mut recorder);
        clock.stop();
        clock.stop();
        driver.process_pending(&mut recorder);

        assert_eq!(recorder.starts, 1);
        assert_eq!(recorder.stops, 1);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_stop_then_start_in_one_drain_ends_running() {
        let clock = Clock::new(120.0);
        let mut driver = ClockDriver::new(clock.clone());
        let mut recorder = Recorder::default();

        clock.start();
        driver.process_pending(&mut recorder);
        clock.stop();
        clock.start();
        clock.timer_tick();
        clock.timer_tick();
        driver.process_pending(&mut recorder);

        assert!(clock.is_running());
        assert_eq!(recorder.transitions, vec!["start", "stop", "start"]);
        // Ticks after the restart count from zero
        assert_eq!(driver.tick_count(), 2);
    }

    #[test]
    fn test_start_then_stop_in_one_drain_ends_stopped() {
        let clock = Clock::new(120.0);
        let mut driver = ClockDriver::new(clock.clone());
        let mut recorder = Recorder::default();

        clock.start();
        clock.timer_tick();
        clock.stop();
        driver.process_pending(&mut recorder);

        assert!(!clock.is_running());
        assert_eq!(recorder.transitions, vec!["start", "stop"]);
        assert_eq!(driver.tick_count(), 0);
    }

    #[test]
    fn test_stop_then_continue_in_one_drain_ends_running() {
        let clock = Clock::new(120.0);
        let mut driver = ClockDriver::new(clock.clone());
        let mut recorder = Recorder::default();

        clock.start();
        driver.process_pending(&mut recorder);
        clock.stop();
        clock.resume();
        driver.process_pending(&mut recorder);

        assert!(clock.is_running());
        assert_eq!(recorder.transitions, vec!["start", "stop", "continue"]);
    }

    #[test]
    fn test_stop_resets_counters() {
        let clock = Clock::new(120.0);
        let mut driver = ClockDriver::new(clock.clone());
        let mut recorder = Recorder::default();

        clock.start();
        for _ in 0..7 {
            clock.timer_tick();
        }
        driver.process_pending(&mut recorder);
        assert_eq!(driver.tick_count(), 7);

        clock.stop();
        driver.process_pending(&mut recorder);
        assert_eq!(driver.tick_count(), 0);
        assert_eq!(driver.step_counter(), 0);
        assert_eq!(driver.ppqn_counter(), 0);
    }

    #[test]
    fn test_slave_ignores_timer() {
        let clock = Clock::new(120.0);
        clock.set_sync_mode(SyncMode::Slave);
        clock.start();
        clock.timer_tick();
        assert_eq!(clock.pending().pending_ticks(), 0);

        clock.receive_external_tick_at(1_000);
        clock.receive_external_tick_at(21_833);
        assert_eq!(clock.pending().pending_ticks(), 2);
        assert_eq!(clock.jitter().last_interval_us, 20_833);
    }

    #[test]
    fn test_master_ignores_external_ticks() {
        let clock = Clock::new(120.0);
        clock.start();
        clock.receive_external_tick_at(5);
        assert_eq!(clock.pending().pending_ticks(), 0);
        assert_eq!(clock.jitter().samples, 1);
    }

    #[test]
    fn test_resume_keeps_counters() {
        let clock = Clock::new(120.0);
        let mut driver = ClockDriver::new(clock.clone());
        let mut recorder = Recorder::default();

        clock.start();
        for _ in 0..4 {
            clock.timer_tick();
        }
        driver.process_pending(&mut recorder);

        // Continue with two more ticks on top of the existing count
        driver.apply(Drained { resume: true, ticks: 2, ..Drained::default() }, &mut recorder);
        assert_eq!(driver.tick_count(), 6);
        assert_eq!(recorder.continues, 1);
    }

    #[test]
    fn test_set_bpm_rejects_invalid() {
        let clock = Clock::new(120.0);
        clock.set_bpm(0.0);
        clock.set_bpm(-10.0);
        clock.set_bpm(f32::NAN);
        assert_eq!(clock.bpm(), 120.0);
        assert_eq!(clock.interval_us(), 20833);

        clock.set_bpm(60.0);
        assert_eq!(clock.interval_us(), 41666);
    }
}

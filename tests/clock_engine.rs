// Integration test: clock handoff, counters and sync modes
//
// Marks pending work the way the timer and the router do, then drains it
// through a driver or the worker thread.

use euclidio::clock::{Clock, ClockDriver, ClockListener, ClockWorker, SyncMode, TickInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Log {
    ticks: Vec<TickInfo>,
    steps: Vec<u32>,
    events: Vec<&'static str>,
}

impl ClockListener for Log {
    fn on_tick(&mut self, tick: TickInfo) {
        self.ticks.push(tick);
    }

    fn on_step_start(&mut self, step: u32) {
        self.steps.push(step);
    }

    fn on_start(&mut self) {
        self.events.push("start");
    }

    fn on_stop(&mut self) {
        self.events.push("stop");
    }

    fn on_continue(&mut self) {
        self.events.push("continue");
    }
}

fn run_master(clock: &Arc<Clock>, ticks: u32) {
    for _ in 0..ticks {
        clock.timer_tick();
    }
}

#[test]
fn test_master_counts_every_drained_tick() {
    let clock = Clock::new(120.0);
    let mut driver = ClockDriver::new(clock.clone());
    let mut log = Log::default();

    clock.start();
    run_master(&clock, 25);
    driver.process_pending(&mut log);

    assert_eq!(clock.tick_count(), 25);
    assert_eq!(driver.tick_count(), 25);
    assert_eq!(log.ticks.len(), 25);
    // One step every six ticks
    assert_eq!(log.steps, vec![1, 2, 3, 4]);
    assert_eq!(clock.step_count(), 4);
    assert!(log.ticks[5].step_boundary);
    assert!(!log.ticks[6].step_boundary);
}

#[test]
fn test_ticks_while_stopped_are_ignored() {
    let clock = Clock::new(120.0);
    let mut driver = ClockDriver::new(clock.clone());
    let mut log = Log::default();

    run_master(&clock, 10);
    driver.process_pending(&mut log);
    assert!(log.ticks.is_empty());
    assert_eq!(clock.tick_count(), 0);
}

#[test]
fn test_slave_ignores_internal_timer() {
    let clock = Clock::new(120.0);
    clock.set_sync_mode(SyncMode::Slave);
    let mut driver = ClockDriver::new(clock.clone());
    let mut log = Log::default();

    clock.start();
    run_master(&clock, 10);
    clock.receive_external_tick();
    clock.receive_external_tick();
    driver.process_pending(&mut log);

    assert_eq!(log.ticks.len(), 2);
}

#[test]
fn test_stop_then_start_restarts_counters() {
    let clock = Clock::new(120.0);
    let mut driver = ClockDriver::new(clock.clone());
    let mut log = Log::default();

    clock.start();
    run_master(&clock, 7);
    driver.process_pending(&mut log);
    clock.stop();
    driver.process_pending(&mut log);
    assert_eq!(clock.tick_count(), 0);

    clock.start();
    run_master(&clock, 1);
    driver.process_pending(&mut log);
    assert_eq!(log.events, vec!["start", "stop", "start"]);
    assert_eq!(log.ticks.last().map(|t| t.tick), Some(1));
}

#[test]
fn test_duplicate_transport_requests_are_ignored() {
    let clock = Clock::new(120.0);
    let mut driver = ClockDriver::new(clock.clone());
    let mut log = Log::default();

    clock.start();
    clock.start();
    clock.resume();
    driver.process_pending(&mut log);
    assert_eq!(log.events, vec!["start"]);

    clock.stop();
    clock.stop();
    driver.process_pending(&mut log);
    assert_eq!(log.events, vec!["start", "stop"]);
}

#[test]
fn test_reset_zeroes_counters_while_running() {
    let clock = Clock::new(120.0);
    let mut driver = ClockDriver::new(clock.clone());
    let mut log = Log::default();

    clock.start();
    run_master(&clock, 9);
    driver.process_pending(&mut log);
    clock.reset();
    run_master(&clock, 2);
    driver.process_pending(&mut log);

    assert!(clock.is_running());
    assert_eq!(clock.tick_count(), 2);
}

#[test]
fn test_tempo_changes() {
    let clock = Clock::new(120.0);
    assert_eq!(clock.interval_us(), 20833);
    clock.set_bpm(60.0);
    assert_eq!(clock.interval_us(), 41666);
    clock.set_bpm(0.0);
    clock.set_bpm(-5.0);
    clock.set_bpm(f32::NAN);
    assert_eq!(clock.bpm(), 60.0);
}

#[test]
fn test_jitter_statistics() {
    let clock = Clock::new(120.0);
    for at in [0u64, 20_000, 41_000, 61_500] {
        clock.receive_external_tick_at(at);
    }
    let jitter = clock.jitter();
    assert_eq!(jitter.samples, 4);
    assert_eq!(jitter.min_interval_us, Some(20_000));
    assert_eq!(jitter.max_interval_us, 21_000);
    assert_eq!(jitter.last_interval_us, 20_500);
    assert_eq!(jitter.spread_us(), 1_000);

    clock.reset_jitter_stats();
    assert_eq!(clock.jitter().samples, 0);
}

struct CountTicks(Arc<AtomicU32>);

impl ClockListener for CountTicks {
    fn on_tick(&mut self, _tick: TickInfo) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_worker_drains_in_background() {
    let clock = Clock::new(120.0);
    let count = Arc::new(AtomicU32::new(0));
    let mut worker = ClockWorker::spawn(clock.clone(), CountTicks(count.clone())).unwrap();

    clock.start();
    run_master(&clock, 12);

    let deadline = Instant::now() + Duration::from_secs(2);
    while count.load(Ordering::Relaxed) < 12 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    worker.shutdown();
    assert_eq!(count.load(Ordering::Relaxed), 12);
}

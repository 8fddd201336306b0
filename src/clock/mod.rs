// Clock module - tick source shared by the pattern engines
// Timer handoff, master/slave sync and external clock jitter

pub mod engine;
pub mod jitter;
pub mod pending;
pub mod timer;

pub use engine::{Clock, ClockDriver, ClockListener, ClockWorker, SyncMode, TickInfo};
pub use jitter::{JitterSnapshot, JitterStats};
pub use pending::{Drained, PendingRealtime};
pub use timer::{MasterTimer, Uptime};

/// Pulses per quarter note
pub const PPQN: u32 = 24;

/// Ticks between two `on_step_start` notifications
pub const DEFAULT_TICKS_PER_STEP: u32 = 6;

pub const DEFAULT_BPM: f32 = 120.0;

/// Timer period in microseconds for a tempo
pub fn interval_us(bpm: f32) -> u32 {
    (60_000_000.0 / (bpm as f64 * PPQN as f64)) as u32
}

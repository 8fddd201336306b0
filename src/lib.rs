// Euclidio - Euclidean MIDI sequencer library exports for the binary, tests and benchmarks

pub mod app;
pub mod clock;
pub mod config;
pub mod connection;
pub mod control;
pub mod dispatch;
pub mod midi;
pub mod osc;
pub mod preset;
pub mod sequencer;

pub use app::{App, AppError, Core};
pub use clock::{Clock, ClockDriver, ClockListener, SyncMode};
pub use config::{AppConfig, ConfigError};
pub use control::{Command, EngineState};
pub use midi::{InputPort, MidiRouter, OutputPort, OutputSet, RoutingMatrix, StreamParser};
pub use preset::{Preset, PresetStore};
pub use sequencer::{HarmonicEngine, Pattern, RhythmicEngine, TrackId};

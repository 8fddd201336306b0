// Preset module - whole-instrument snapshots stored as JSON

pub mod store;
pub mod types;

pub use store::{PRESET_SLOTS, PresetEntry, PresetError, PresetStore};
pub use types::{HarmonicTrackPreset, Preset, PresetOutputs, RhythmicTrackPreset};

// Sequencer module - Euclidean pattern engines driven by the shared clock
// Rhythmic tracks fire single notes, harmonic tracks fire scale chords

pub mod chord;
pub mod euclid;
pub mod harmonic;
pub mod rhythmic;
pub mod scale;
pub mod track;

pub use chord::{ChordList, MAX_CHORDS, MAX_POLYPHONY, Voicing};
pub use euclid::{DebouncedPattern, PATTERN_DEBOUNCE_MS, Pattern};
pub use harmonic::{DistributionMode, HarmonicEngine, HarmonicTrackConfig};
pub use rhythmic::{EditOutcome, EditParam, RhythmicEngine};
pub use scale::ScaleType;
pub use track::{MAX_STEPS, MAX_TRACKS, PlayMode, Resolution, TrackConfig, TrackId};

/// Which engine a voice belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Rhythmic,
    Harmonic,
}

/// One sounding voice slot: a track of a lane, and a voice within the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceKey {
    pub lane: Lane,
    pub track: TrackId,
    pub voice: u8,
}

impl VoiceKey {
    pub fn rhythmic(track: TrackId) -> Self {
        Self {
            lane: Lane::Rhythmic,
            track,
            voice: 0,
        }
    }

    pub fn harmonic(track: TrackId, voice: u8) -> Self {
        Self {
            lane: Lane::Harmonic,
            track,
            voice,
        }
    }
}

/// A note an engine wants played now, with its length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteTrigger {
    pub voice: VoiceKey,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub length_ms: u16,
}

// Track - identifiers, resolutions and rhythmic track configuration

use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_TRACKS: usize = 8;
pub const MAX_STEPS: u8 = 32;

/// Index of one of the fixed track slots (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u8);

impl TrackId {
    pub fn new(index: usize) -> Option<Self> {
        (index < MAX_TRACKS).then_some(Self(index as u8))
    }

    /// Out-of-range values are clamped to the first/last track
    pub fn clamped(index: i32) -> Self {
        Self(index.clamp(0, MAX_TRACKS as i32 - 1) as u8)
    }

    /// From a 1-based track number as shown to users
    pub fn from_number(number: i32) -> Option<Self> {
        if number < 1 {
            return None;
        }
        Self::new(number as usize - 1)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn all() -> impl Iterator<Item = TrackId> {
        (0..MAX_TRACKS as u8).map(TrackId)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Step length, as ticks of the 24 PPQN clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl Resolution {
    pub fn ticks_per_step(self) -> u32 {
        match self {
            Resolution::Quarter => 24,
            Resolution::Eighth => 12,
            Resolution::Sixteenth => 6,
            Resolution::ThirtySecond => 3,
        }
    }

    /// Rhythmic tracks number resolutions 1..4
    pub fn from_user(value: i32) -> Self {
        match value.clamp(1, 4) {
            1 => Resolution::Quarter,
            2 => Resolution::Eighth,
            3 => Resolution::Sixteenth,
            _ => Resolution::ThirtySecond,
        }
    }

    pub fn user(self) -> u8 {
        match self {
            Resolution::Quarter => 1,
            Resolution::Eighth => 2,
            Resolution::Sixteenth => 3,
            Resolution::ThirtySecond => 4,
        }
    }

    /// Harmonic tracks index resolutions 0..2 and stop at sixteenths
    pub fn from_harmonic_index(index: i32) -> Self {
        match index.clamp(0, 2) {
            0 => Resolution::Quarter,
            1 => Resolution::Eighth,
            _ => Resolution::Sixteenth,
        }
    }

    pub fn harmonic_index(self) -> u8 {
        match self {
            Resolution::Quarter => 0,
            Resolution::Eighth => 1,
            Resolution::Sixteenth | Resolution::ThirtySecond => 2,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Eighth
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMode {
    Stop,
    Play,
}

impl Default for PlayMode {
    fn default() -> Self {
        PlayMode::Stop
    }
}

pub const RHYTHMIC_NOTE_LENGTH_MIN: u16 = 50;
pub const RHYTHMIC_NOTE_LENGTH_MAX: u16 = 700;

/// One rhythmic track. Every setter clamps; nothing is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackConfig {
    steps: u8,
    hits: u8,
    offset: u8,
    note: u8,
    velocity: u8,
    channel: u8,
    resolution: Resolution,
    note_length_ms: u16,
    enabled: bool,
    play_mode: PlayMode,
}

impl TrackConfig {
    pub fn new(track: TrackId) -> Self {
        Self {
            steps: 16,
            hits: 4,
            offset: 0,
            note: 36 + track.index() as u8,
            velocity: 100,
            channel: 1,
            resolution: Resolution::Eighth,
            note_length_ms: 100,
            enabled: false,
            play_mode: PlayMode::Stop,
        }
    }

    pub fn steps(&self) -> u8 {
        self.steps
    }

    /// Stored hit count, may exceed `steps` after a steps reduction
    pub fn hits(&self) -> u8 {
        self.hits
    }

    /// Hits as used for generation
    pub fn effective_hits(&self) -> u8 {
        self.hits.min(self.steps)
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn note_length_ms(&self) -> u16 {
        self.note_length_ms
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    pub fn set_steps(&mut self, steps: i32) {
        self.steps = steps.clamp(1, MAX_STEPS as i32) as u8;
        self.offset %= self.steps;
    }

    pub fn set_hits(&mut self, hits: i32) {
        self.hits = hits.clamp(0, MAX_STEPS as i32) as u8;
    }

    /// Wraps into `0..steps`
    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset.rem_euclid(self.steps as i32) as u8;
    }

    pub fn set_note(&mut self, note: i32) {
        self.note = note.clamp(0, 127) as u8;
    }

    pub fn set_velocity(&mut self, velocity: i32) {
        self.velocity = velocity.clamp(0, 127) as u8;
    }

    pub fn set_channel(&mut self, channel: i32) {
        self.channel = channel.clamp(0, 15) as u8;
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    pub fn set_note_length_ms(&mut self, length: i32) {
        self.note_length_ms = length.clamp(
            RHYTHMIC_NOTE_LENGTH_MIN as i32,
            RHYTHMIC_NOTE_LENGTH_MAX as i32,
        ) as u16;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.play_mode = mode;
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self::new(TrackId::default())
    }
}

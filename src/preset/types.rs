// Types for preset persistence

use crate::control::EngineState;
use crate::midi::OutputSet;
use crate::sequencer::{
    ChordList, DistributionMode, HarmonicTrackConfig, Resolution, ScaleType, TrackConfig, TrackId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PRESET_TYPE: &str = "euclidio";
pub const PRESET_VERSION: u32 = 1;

/// Output sets stored alongside the tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetOutputs {
    pub notes: OutputSet,
    pub clock: OutputSet,
    pub feedback: OutputSet,
}

impl Default for PresetOutputs {
    fn default() -> Self {
        Self {
            notes: OutputSet::ALL,
            clock: OutputSet::ALL,
            feedback: OutputSet::ALL,
        }
    }
}

/// One rhythmic track as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RhythmicTrackPreset {
    pub track_index: u8,
    pub steps: i32,
    pub hits: i32,
    pub offset: i32,
    pub note: i32,
    pub velocity: i32,
    pub midi_channel: i32,
    /// 1..4, quarter to thirty-second
    pub resolution: i32,
    pub note_length: i32,
    pub enabled: bool,
}

impl RhythmicTrackPreset {
    pub fn capture(track: TrackId, config: &TrackConfig) -> Self {
        Self {
            track_index: track.index() as u8,
            steps: config.steps() as i32,
            hits: config.hits() as i32,
            offset: config.offset() as i32,
            note: config.note() as i32,
            velocity: config.velocity() as i32,
            midi_channel: config.channel() as i32,
            resolution: config.resolution().user() as i32,
            note_length: config.note_length_ms() as i32,
            enabled: config.enabled(),
        }
    }

    /// Config for this track, every field clamped by its setter
    pub fn to_config(&self, track: TrackId) -> TrackConfig {
        let mut config = TrackConfig::new(track);
        config.set_steps(self.steps);
        config.set_hits(self.hits);
        config.set_offset(self.offset);
        config.set_note(self.note);
        config.set_velocity(self.velocity);
        config.set_channel(self.midi_channel);
        config.set_resolution(Resolution::from_user(self.resolution));
        config.set_note_length_ms(self.note_length);
        config.set_enabled(self.enabled);
        config
    }
}

/// One harmonic track as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarmonicTrackPreset {
    pub track_index: u8,
    pub steps: i32,
    pub hits: i32,
    pub offset: i32,
    pub tonic: i32,
    pub scale_type: i32,
    pub base_octave: i32,
    pub polyphony: i32,
    pub midi_channel: i32,
    pub velocity: i32,
    pub note_length: i32,
    pub distribution_mode: DistributionMode,
    /// 0..2, quarter to sixteenth
    pub resolution: i32,
    pub chord_list: Vec<u8>,
    pub enabled: bool,
}

impl HarmonicTrackPreset {
    pub fn capture(track: TrackId, config: &HarmonicTrackConfig) -> Self {
        Self {
            track_index: track.index() as u8,
            steps: config.steps() as i32,
            hits: config.hits() as i32,
            offset: config.offset() as i32,
            tonic: config.tonic() as i32,
            scale_type: config.scale().index() as i32,
            base_octave: config.octave() as i32,
            polyphony: config.polyphony() as i32,
            midi_channel: config.channel() as i32,
            velocity: config.velocity() as i32,
            note_length: config.note_length_ms() as i32,
            distribution_mode: config.mode(),
            resolution: config.resolution().harmonic_index() as i32,
            chord_list: config.chords.as_slice().to_vec(),
            enabled: config.enabled(),
        }
    }

    pub fn to_config(&self) -> HarmonicTrackConfig {
        let mut config = HarmonicTrackConfig::default();
        config.set_steps(self.steps);
        config.set_hits(self.hits);
        config.set_offset(self.offset);
        config.set_tonic(self.tonic);
        config.set_scale(ScaleType::clamped(self.scale_type));
        config.set_octave(self.base_octave);
        config.set_polyphony(self.polyphony);
        config.set_channel(self.midi_channel);
        config.set_velocity(self.velocity);
        config.set_note_length_ms(self.note_length);
        config.set_mode(self.distribution_mode);
        config.set_resolution(Resolution::from_harmonic_index(self.resolution));
        let degrees: Vec<u8> = self.chord_list.iter().map(|d| (*d).min(6)).collect();
        config.chords = ChordList::from_degrees(&degrees);
        config.set_enabled(self.enabled);
        config
    }
}

/// Whole-instrument snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub name: String,
    #[serde(rename = "saved_at")]
    pub saved_at: DateTime<Utc>,
    pub tracks: Vec<RhythmicTrackPreset>,
    #[serde(default)]
    pub harmonic_tracks: Vec<HarmonicTrackPreset>,
    pub output_notes: u8,
    pub output_clock: u8,
    #[serde(default = "all_outputs")]
    pub output_feedback: u8,
}

fn all_outputs() -> u8 {
    OutputSet::ALL.bits()
}

impl Preset {
    pub fn capture(name: &str, state: &EngineState, outputs: PresetOutputs) -> Self {
        Self {
            kind: PRESET_TYPE.to_string(),
            version: PRESET_VERSION,
            name: name.to_string(),
            saved_at: Utc::now(),
            tracks: TrackId::all()
                .map(|id| RhythmicTrackPreset::capture(id, state.rhythmic.track(id)))
                .collect(),
            harmonic_tracks: TrackId::all()
                .map(|id| HarmonicTrackPreset::capture(id, state.harmonic.track(id)))
                .collect(),
            output_notes: outputs.notes.bits(),
            output_clock: outputs.clock.bits(),
            output_feedback: outputs.feedback.bits(),
        }
    }

    /// Push every stored track through the engine setters. Entries with an
    /// out-of-range track index are skipped.
    pub fn apply(&self, state: &mut EngineState) -> PresetOutputs {
        for entry in &self.tracks {
            if let Some(id) = TrackId::new(entry.track_index as usize) {
                state.rhythmic.apply_config(id, entry.to_config(id));
            }
        }
        for entry in &self.harmonic_tracks {
            if let Some(id) = TrackId::new(entry.track_index as usize) {
                state.harmonic.apply_config(id, entry.to_config());
            }
        }
        self.outputs()
    }

    pub fn outputs(&self) -> PresetOutputs {
        PresetOutputs {
            notes: OutputSet::from_bits(self.output_notes),
            clock: OutputSet::from_bits(self.output_clock),
            feedback: OutputSet::from_bits(self.output_feedback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_covers_every_track() {
        let state = EngineState::new();
        let preset = Preset::capture("init", &state, PresetOutputs::default());
        assert_eq!(preset.tracks.len(), 8);
        assert_eq!(preset.harmonic_tracks.len(), 8);
        assert_eq!(preset.tracks[3].note, 39);
        assert_eq!(preset.harmonic_tracks[0].chord_list, vec![0]);
    }

    #[test]
    fn test_json_field_names() {
        let state = EngineState::new();
        let preset = Preset::capture("names", &state, PresetOutputs::default());
        let json = serde_json::to_string(&preset).unwrap();
        for field in [
            "\"type\":\"euclidio\"",
            "\"saved_at\"",
            "\"harmonicTracks\"",
            "\"trackIndex\"",
            "\"midiChannel\"",
            "\"noteLength\"",
            "\"chordList\"",
            "\"outputFeedback\"",
        ] {
            assert!(json.contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_apply_clamps_out_of_range_values() {
        let mut entry = RhythmicTrackPreset::capture(TrackId::default(), &TrackConfig::default());
        entry.steps = 99;
        entry.note_length = 5000;
        entry.resolution = 9;
        let config = entry.to_config(TrackId::default());
        assert_eq!(config.steps(), 32);
        assert_eq!(config.note_length_ms(), 700);
        assert_eq!(config.resolution(), Resolution::ThirtySecond);

        let mut harmonic =
            HarmonicTrackPreset::capture(TrackId::default(), &HarmonicTrackConfig::default());
        harmonic.polyphony = 12;
        harmonic.chord_list = vec![3, 40];
        let config = harmonic.to_config();
        assert_eq!(config.polyphony(), 5);
        assert_eq!(config.chords.as_slice(), &[3, 6]);
    }

    #[test]
    fn test_apply_skips_bad_track_index() {
        let mut state = EngineState::new();
        let mut preset = Preset::capture("x", &state, PresetOutputs::default());
        preset.tracks[0].track_index = 12;
        preset.tracks[0].steps = 5;
        preset.tracks[1].steps = 7;
        preset.apply(&mut state);
        assert_eq!(state.rhythmic.track(TrackId::clamped(0)).steps(), 16);
        assert_eq!(state.rhythmic.track(TrackId::clamped(1)).steps(), 7);
    }
}

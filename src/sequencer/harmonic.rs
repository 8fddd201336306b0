// Harmonic engine - Euclidean tracks that play scale chords from a chord list

use super::chord::{self, ChordList, MAX_POLYPHONY, Voicing};
use super::euclid::DebouncedPattern;
use super::scale::ScaleType;
use super::track::{MAX_STEPS, MAX_TRACKS, Resolution, TrackId};
use super::{NoteTrigger, VoiceKey};
use serde::{Deserialize, Serialize};

pub const HARMONIC_NOTE_LENGTH_MIN: u16 = 10;
pub const HARMONIC_NOTE_LENGTH_MAX: u16 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionMode {
    /// Every voice of the chord
    Chords,
    /// Root only
    Notes,
}

impl Default for DistributionMode {
    fn default() -> Self {
        DistributionMode::Chords
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarmonicTrackConfig {
    steps: u8,
    hits: u8,
    offset: u8,
    tonic: u8,
    scale: ScaleType,
    mode: DistributionMode,
    polyphony: u8,
    octave: i8,
    channel: u8,
    velocity: u8,
    note_length_ms: u16,
    resolution: Resolution,
    enabled: bool,
    pub chords: ChordList,
}

impl HarmonicTrackConfig {
    pub fn steps(&self) -> u8 {
        self.steps
    }

    pub fn hits(&self) -> u8 {
        self.hits
    }

    pub fn effective_hits(&self) -> u8 {
        self.hits.min(self.steps)
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn tonic(&self) -> u8 {
        self.tonic
    }

    pub fn scale(&self) -> ScaleType {
        self.scale
    }

    pub fn mode(&self) -> DistributionMode {
        self.mode
    }

    pub fn polyphony(&self) -> u8 {
        self.polyphony
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn note_length_ms(&self) -> u16 {
        self.note_length_ms
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_steps(&mut self, steps: i32) {
        self.steps = steps.clamp(1, MAX_STEPS as i32) as u8;
        self.offset %= self.steps;
    }

    pub fn set_hits(&mut self, hits: i32) {
        self.hits = hits.clamp(0, MAX_STEPS as i32) as u8;
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset.rem_euclid(self.steps as i32) as u8;
    }

    pub fn set_tonic(&mut self, tonic: i32) {
        self.tonic = tonic.clamp(0, 11) as u8;
    }

    pub fn set_scale(&mut self, scale: ScaleType) {
        self.scale = scale;
    }

    pub fn set_mode(&mut self, mode: DistributionMode) {
        self.mode = mode;
    }

    pub fn set_polyphony(&mut self, voices: i32) {
        self.polyphony = voices.clamp(1, MAX_POLYPHONY as i32) as u8;
    }

    pub fn set_octave(&mut self, octave: i32) {
        self.octave = octave.clamp(-2, 2) as i8;
    }

    pub fn set_channel(&mut self, channel: i32) {
        self.channel = channel.clamp(0, 15) as u8;
    }

    pub fn set_velocity(&mut self, velocity: i32) {
        self.velocity = velocity.clamp(0, 127) as u8;
    }

    pub fn set_note_length_ms(&mut self, length: i32) {
        self.note_length_ms = length.clamp(
            HARMONIC_NOTE_LENGTH_MIN as i32,
            HARMONIC_NOTE_LENGTH_MAX as i32,
        ) as u16;
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        // Harmonic tracks stop at sixteenths
        self.resolution = Resolution::from_harmonic_index(resolution.harmonic_index() as i32);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Voicing of a degree under this track's tonic, scale and octave
    pub fn voice(&self, degree: u8) -> Voicing {
        chord::voice_chord(self.tonic, self.scale, self.octave, degree, self.polyphony)
    }

    pub fn chord_name(&self, index: usize) -> String {
        let degree = self.chords.get(index).unwrap_or(0);
        chord::chord_name(self.tonic, self.scale, degree, self.polyphony)
    }
}

impl Default for HarmonicTrackConfig {
    fn default() -> Self {
        Self {
            steps: 16,
            hits: 4,
            offset: 0,
            tonic: 0,
            scale: ScaleType::Major,
            mode: DistributionMode::Chords,
            polyphony: 1,
            octave: 0,
            channel: 0,
            velocity: 100,
            note_length_ms: 200,
            resolution: Resolution::Eighth,
            enabled: false,
            chords: ChordList::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct HarmonicTrack {
    config: HarmonicTrackConfig,
    pattern: DebouncedPattern,
    last_step: Option<u8>,
    current_step: u8,
}

pub struct HarmonicEngine {
    tracks: [HarmonicTrack; MAX_TRACKS],
    active: TrackId,
    running: bool,
    pending_feedback: bool,
    now_ms: u64,
}

impl HarmonicEngine {
    pub fn new() -> Self {
        Self {
            tracks: Default::default(),
            active: TrackId::default(),
            running: false,
            pending_feedback: false,
            now_ms: 0,
        }
    }

    /// Start playback from the first chord of every list
    pub fn start(&mut self) {
        self.running = true;
        for track in &mut self.tracks {
            track.config.chords.rewind();
            track.last_step = None;
            track.current_step = 0;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        for track in &mut self.tracks {
            track.last_step = None;
            track.current_step = 0;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn update(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        for track in &mut self.tracks {
            let config = &track.config;
            track
                .pattern
                .poll(now_ms, config.steps(), config.effective_hits(), config.offset());
        }
    }

    /// One-shot flag raised by a track selection, cleared on read
    pub fn take_pending_feedback(&mut self) -> bool {
        std::mem::take(&mut self.pending_feedback)
    }

    pub fn on_tick<F: FnMut(NoteTrigger)>(&mut self, tick: u32, mut emit: F) {
        if !self.running {
            return;
        }

        for (index, track) in self.tracks.iter_mut().enumerate() {
            if !track.config.enabled() {
                continue;
            }
            let ticks_per_step = track.config.resolution().ticks_per_step();
            let step = ((tick / ticks_per_step) % track.config.steps() as u32) as u8;
            if track.last_step == Some(step) {
                continue;
            }
            track.last_step = Some(step);
            track.current_step = step;

            if !track.pattern.pattern().is_hit(step) {
                continue;
            }

            // Rotating cursor; without chords the step picks the degree
            let scale_len = track.config.scale().len();
            let degree = match track.config.chords.next_degree() {
                Some(degree) => degree as usize % scale_len,
                None => step as usize % scale_len,
            } as u8;

            let voicing = track.config.voice(degree);
            let notes = match track.config.mode() {
                DistributionMode::Chords => voicing.notes(),
                DistributionMode::Notes => &voicing.notes()[..1],
            };
            let id = TrackId::clamped(index as i32);
            for (voice, note) in notes.iter().enumerate() {
                emit(NoteTrigger {
                    voice: VoiceKey::harmonic(id, voice as u8),
                    channel: track.config.channel(),
                    note: *note,
                    velocity: track.config.velocity(),
                    length_ms: track.config.note_length_ms(),
                });
            }
        }
    }

    pub fn active_track(&self) -> TrackId {
        self.active
    }

    pub fn set_active_track(&mut self, track: TrackId) {
        self.active = track;
        self.pending_feedback = true;
    }

    pub fn track(&self, track: TrackId) -> &HarmonicTrackConfig {
        &self.tracks[track.index()].config
    }

    pub fn active_config(&self) -> &HarmonicTrackConfig {
        self.track(self.active)
    }

    pub fn pattern_bit(&self, track: TrackId, step: u8) -> bool {
        self.tracks[track.index()].pattern.pattern().is_hit(step)
    }

    pub fn current_step(&self, track: TrackId) -> u8 {
        self.tracks[track.index()].current_step
    }

    /// Enable or disable the active track
    pub fn set_active(&mut self, on: bool) {
        self.set_track_active(self.active, on);
    }

    /// Enabling starts the engine if idle; disabling the last enabled track stops it
    pub fn set_track_active(&mut self, track: TrackId, on: bool) {
        self.tracks[track.index()].config.set_enabled(on);
        if on {
            if !self.running {
                self.start();
            }
        } else if !self.tracks.iter().any(|t| t.config.enabled()) {
            self.stop();
        }
    }

    fn active_mut(&mut self) -> &mut HarmonicTrackConfig {
        &mut self.tracks[self.active.index()].config
    }

    fn edit_pattern<F: FnOnce(&mut HarmonicTrackConfig)>(&mut self, edit: F) {
        let now = self.now_ms;
        let slot = &mut self.tracks[self.active.index()];
        edit(&mut slot.config);
        slot.pattern.mark_dirty(now);
    }

    pub fn set_steps(&mut self, steps: i32) {
        self.edit_pattern(|c| c.set_steps(steps));
    }

    pub fn set_hits(&mut self, hits: i32) {
        self.edit_pattern(|c| c.set_hits(hits));
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.edit_pattern(|c| c.set_offset(offset));
    }

    pub fn set_tonic(&mut self, tonic: i32) {
        self.active_mut().set_tonic(tonic);
    }

    pub fn set_scale(&mut self, scale: ScaleType) {
        self.active_mut().set_scale(scale);
    }

    pub fn set_mode(&mut self, mode: DistributionMode) {
        self.active_mut().set_mode(mode);
    }

    pub fn set_polyphony(&mut self, voices: i32) {
        self.active_mut().set_polyphony(voices);
    }

    pub fn set_octave(&mut self, octave: i32) {
        self.active_mut().set_octave(octave);
    }

    pub fn set_channel(&mut self, channel: i32) {
        self.active_mut().set_channel(channel);
    }

    pub fn set_velocity(&mut self, velocity: i32) {
        self.active_mut().set_velocity(velocity);
    }

    pub fn set_note_length(&mut self, length_ms: i32) {
        self.active_mut().set_note_length_ms(length_ms);
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.active_mut().set_resolution(resolution);
    }

    pub fn chords(&self) -> &ChordList {
        &self.active_config().chords
    }

    pub fn chords_mut(&mut self) -> &mut ChordList {
        &mut self.active_mut().chords
    }

    /// Replace a whole track (preset load)
    pub fn apply_config(&mut self, track: TrackId, config: HarmonicTrackConfig) {
        let slot = &mut self.tracks[track.index()];
        slot.pattern
            .regenerate(config.steps(), config.effective_hits(), config.offset());
        slot.config = config;
        slot.last_step = None;
    }
}

impl Default for HarmonicEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &mut HarmonicEngine, ticks: std::ops::RangeInclusive<u32>) -> Vec<NoteTrigger> {
        let mut out = Vec::new();
        for tick in ticks {
            engine.on_tick(tick, |t| out.push(t));
        }
        out
    }

    #[test]
    fn test_defaults() {
        let config = HarmonicTrackConfig::default();
        assert_eq!(config.steps(), 16);
        assert_eq!(config.polyphony(), 1);
        assert_eq!(config.note_length_ms(), 200);
        assert_eq!(config.chords.as_slice(), &[0]);
        assert!(!config.enabled());
    }

    #[test]
    fn test_set_active_starts_and_stops() {
        let mut engine = HarmonicEngine::new();
        engine.set_active(true);
        assert!(engine.is_running());

        engine.set_track_active(TrackId::clamped(3), true);
        engine.set_active(false);
        assert!(engine.is_running());
        engine.set_track_active(TrackId::clamped(3), false);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_chord_cursor_visits_every_degree() {
        let mut engine = HarmonicEngine::new();
        engine.chords_mut().resize(0);
        for degree in [0, 3, 4] {
            engine.chords_mut().push(degree);
        }
        engine.set_hits(16);
        engine.update(1_000);
        engine.set_active(true);

        // 16 steps at eighths, every step a hit: three chords rotate
        let notes: Vec<u8> = run(&mut engine, 1..=71).iter().map(|t| t.note).collect();
        assert_eq!(notes, vec![48, 53, 55, 48, 53, 55]);
    }

    #[test]
    fn test_cursor_not_reset_by_cycle() {
        let mut engine = HarmonicEngine::new();
        engine.chords_mut().resize(0);
        engine.chords_mut().push(0);
        engine.chords_mut().push(1);
        engine.set_steps(1);
        engine.set_hits(1);
        engine.update(1_000);
        engine.set_active(true);

        // One-step pattern: the track sits on step 0 and never re-fires
        let first = run(&mut engine, 1..=30);
        assert_eq!(first.len(), 1);

        engine.set_steps(3);
        engine.set_hits(3);
        engine.update(2_000);
        let notes: Vec<u8> = run(&mut engine, 31..=72).iter().map(|t| t.note).collect();
        // Cursor continues from the second chord
        assert_eq!(notes[0], 50);
    }

    #[test]
    fn test_polyphony_and_notes_mode() {
        let mut engine = HarmonicEngine::new();
        engine.set_polyphony(3);
        engine.set_active(true);
        let chord = run(&mut engine, 1..=1);
        assert_eq!(chord.iter().map(|t| t.note).collect::<Vec<_>>(), vec![48, 52, 55]);
        assert_eq!(chord[2].voice, VoiceKey::harmonic(TrackId::default(), 2));

        engine.set_mode(DistributionMode::Notes);
        engine.start();
        let root = run(&mut engine, 1..=1);
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].note, 48);
    }

    #[test]
    fn test_empty_chord_list_uses_step() {
        let mut engine = HarmonicEngine::new();
        engine.chords_mut().resize(0);
        engine.set_active(true);
        let notes: Vec<u8> = run(&mut engine, 1..=60).iter().map(|t| t.note).collect();
        // Hits at steps 0 and 4
        assert_eq!(notes, vec![48, 55]);
    }

    #[test]
    fn test_track_selection_defers_feedback() {
        let mut engine = HarmonicEngine::new();
        assert!(!engine.take_pending_feedback());
        engine.set_active_track(TrackId::clamped(2));
        assert!(engine.take_pending_feedback());
        assert!(!engine.take_pending_feedback());
        assert_eq!(engine.active_track().index(), 2);
    }

    #[test]
    fn test_tonic_clamps_instead_of_wrapping() {
        let mut engine = HarmonicEngine::new();
        engine.set_tonic(12);
        assert_eq!(engine.active_config().tonic(), 11);
        engine.set_tonic(-3);
        assert_eq!(engine.active_config().tonic(), 0);
        engine.set_tonic(7);
        assert_eq!(engine.active_config().tonic(), 7);
    }

    #[test]
    fn test_setters_clamp() {
        let mut engine = HarmonicEngine::new();
        engine.set_tonic(14);
        engine.set_octave(-7);
        engine.set_polyphony(8);
        engine.set_note_length(1);
        engine.set_resolution(Resolution::ThirtySecond);
        let config = engine.active_config();
        assert_eq!(config.tonic(), 11);
        assert_eq!(config.octave(), -2);
        assert_eq!(config.polyphony(), 5);
        assert_eq!(config.note_length_ms(), 10);
        assert_eq!(config.resolution(), Resolution::Sixteenth);
    }
}

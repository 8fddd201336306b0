// Rhythmic engine - eight Euclidean tracks, each firing one note per hit

use super::euclid::DebouncedPattern;
use super::track::{MAX_STEPS, MAX_TRACKS, PlayMode, Resolution, TrackConfig, TrackId};
use super::{NoteTrigger, VoiceKey};

/// Parameter currently under the edit cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditParam {
    Play,
    Steps,
    Hits,
    Offset,
    Note,
    Velocity,
    Channel,
    Resolution,
    Track,
    Tempo,
    NoteLength,
    Dub,
}

impl EditParam {
    pub const ALL: [EditParam; 12] = [
        EditParam::Play,
        EditParam::Steps,
        EditParam::Hits,
        EditParam::Offset,
        EditParam::Note,
        EditParam::Velocity,
        EditParam::Channel,
        EditParam::Resolution,
        EditParam::Track,
        EditParam::Tempo,
        EditParam::NoteLength,
        EditParam::Dub,
    ];

    fn position(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl Default for EditParam {
    fn default() -> Self {
        EditParam::Play
    }
}

/// What an edit asks of the rest of the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Fully handled by the engine
    Applied,
    /// Start or stop the clock
    Transport(PlayMode),
    /// Tempo belongs to the clock: add this many BPM
    TempoDelta(i32),
}

#[derive(Debug, Clone)]
struct RhythmicTrack {
    config: TrackConfig,
    pattern: DebouncedPattern,
    last_step: Option<u8>,
    current_step: u8,
}

impl RhythmicTrack {
    fn new(id: TrackId) -> Self {
        let config = TrackConfig::new(id);
        let pattern = DebouncedPattern::new(config.steps(), config.effective_hits(), config.offset());
        Self {
            config,
            pattern,
            last_step: None,
            current_step: 0,
        }
    }
}

pub struct RhythmicEngine {
    tracks: [RhythmicTrack; MAX_TRACKS],
    selected: TrackId,
    running: bool,
    edit_param: EditParam,
    now_ms: u64,
}

impl RhythmicEngine {
    pub fn new() -> Self {
        Self {
            tracks: std::array::from_fn(|i| RhythmicTrack::new(TrackId::clamped(i as i32))),
            selected: TrackId::default(),
            running: false,
            edit_param: EditParam::default(),
            now_ms: 0,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
        self.tracks[self.selected.index()]
            .config
            .set_play_mode(PlayMode::Play);
        self.reset();
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.tracks[self.selected.index()]
            .config
            .set_play_mode(PlayMode::Stop);
        self.reset();
    }

    /// Forget step positions so the next tick fires its step again
    pub fn reset(&mut self) {
        for track in &mut self.tracks {
            track.last_step = None;
            track.current_step = 0;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance wall time; regenerates patterns whose quiet period elapsed
    pub fn update(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        for track in &mut self.tracks {
            let config = &track.config;
            track
                .pattern
                .poll(now_ms, config.steps(), config.effective_hits(), config.offset());
        }
    }

    /// Evaluate every enabled track at this tick. A step fires once, when
    /// the track's position first moves onto it.
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

            if track.pattern.pattern().is_hit(step) {
                emit(NoteTrigger {
                    voice: VoiceKey::rhythmic(TrackId::clamped(index as i32)),
                    channel: track.config.channel(),
                    note: track.config.note(),
                    velocity: track.config.velocity(),
                    length_ms: track.config.note_length_ms(),
                });
            }
        }
    }

    pub fn selected(&self) -> TrackId {
        self.selected
    }

    pub fn select(&mut self, track: TrackId) {
        self.selected = track;
    }

    pub fn track(&self, track: TrackId) -> &TrackConfig {
        &self.tracks[track.index()].config
    }

    pub fn selected_config(&self) -> &TrackConfig {
        self.track(self.selected)
    }

    pub fn pattern_bit(&self, track: TrackId, step: u8) -> bool {
        self.tracks[track.index()].pattern.pattern().is_hit(step)
    }

    pub fn current_step(&self, track: TrackId) -> u8 {
        self.tracks[track.index()].current_step
    }

    fn edit_pattern<F: FnOnce(&mut TrackConfig)>(&mut self, track: TrackId, edit: F) {
        let now = self.now_ms;
        let slot = &mut self.tracks[track.index()];
        edit(&mut slot.config);
        slot.pattern.mark_dirty(now);
    }

    pub fn set_steps(&mut self, steps: i32) {
        self.edit_pattern(self.selected, |c| c.set_steps(steps));
    }

    pub fn set_hits(&mut self, hits: i32) {
        self.edit_pattern(self.selected, |c| c.set_hits(hits));
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.edit_pattern(self.selected, |c| c.set_offset(offset));
    }

    pub fn set_note(&mut self, note: i32) {
        self.tracks[self.selected.index()].config.set_note(note);
    }

    pub fn set_velocity(&mut self, velocity: i32) {
        self.tracks[self.selected.index()].config.set_velocity(velocity);
    }

    pub fn set_channel(&mut self, channel: i32) {
        self.tracks[self.selected.index()].config.set_channel(channel);
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.tracks[self.selected.index()]
            .config
            .set_resolution(resolution);
    }

    pub fn set_note_length(&mut self, length_ms: i32) {
        self.tracks[self.selected.index()]
            .config
            .set_note_length_ms(length_ms);
    }

    pub fn set_track_enabled(&mut self, track: TrackId, enabled: bool) {
        self.tracks[track.index()].config.set_enabled(enabled);
        if !enabled {
            self.tracks[track.index()].last_step = None;
        }
    }

    /// Returns the new state
    pub fn toggle_track_enabled(&mut self, track: TrackId) -> bool {
        let enabled = !self.track(track).enabled();
        self.set_track_enabled(track, enabled);
        enabled
    }

    /// Replace a whole track configuration (preset load); the pattern is rebuilt at once
    pub fn apply_config(&mut self, track: TrackId, config: TrackConfig) {
        let slot = &mut self.tracks[track.index()];
        slot.pattern
            .regenerate(config.steps(), config.effective_hits(), config.offset());
        slot.config = config;
        slot.last_step = None;
    }

    pub fn edit_param(&self) -> EditParam {
        self.edit_param
    }

    pub fn next_edit_param(&mut self) {
        self.edit_param = self.edit_param.next();
    }

    pub fn prev_edit_param(&mut self) {
        self.edit_param = self.edit_param.prev();
    }

    /// Encoder turn on the parameter under the cursor
    pub fn increment_param(&mut self, amount: i32) -> EditOutcome {
        let config = self.selected_config().clone();
        match self.edit_param {
            EditParam::Play => {
                // Any odd number of detents flips the transport
                if amount.rem_euclid(2) == 0 {
                    return EditOutcome::Applied;
                }
                let mode = match config.play_mode() {
                    PlayMode::Play => PlayMode::Stop,
                    PlayMode::Stop => PlayMode::Play,
                };
                self.tracks[self.selected.index()].config.set_play_mode(mode);
                return EditOutcome::Transport(mode);
            }
            EditParam::Steps => self.set_steps(config.steps() as i32 + amount),
            EditParam::Hits => {
                let hits = (config.hits() as i32 + amount).clamp(1, MAX_STEPS as i32);
                self.set_hits(hits);
            }
            EditParam::Offset => {
                // User-facing offsets are 1..steps and wrap
                let steps = config.steps() as i32;
                let user = (config.offset() as i32 + amount).rem_euclid(steps) + 1;
                self.set_offset(user - 1);
            }
            EditParam::Note => self.set_note(config.note() as i32 + amount),
            EditParam::Velocity => self.set_velocity(config.velocity() as i32 + amount),
            EditParam::Channel => self.set_channel(config.channel() as i32 + amount),
            EditParam::Resolution => {
                self.set_resolution(Resolution::from_user(config.resolution().user() as i32 + amount))
            }
            EditParam::Track => self.select(TrackId::clamped(self.selected.index() as i32 + amount)),
            EditParam::Tempo => return EditOutcome::TempoDelta(amount),
            EditParam::NoteLength => {
                self.set_note_length(config.note_length_ms() as i32 + amount * 50)
            }
            EditParam::Dub => {
                self.toggle_track_enabled(self.selected);
            }
        }
        EditOutcome::Applied
    }
}

impl Default for RhythmicEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(engine: &mut RhythmicEngine, ticks: std::ops::RangeInclusive<u32>) -> Vec<(u32, NoteTrigger)> {
        let mut out = Vec::new();
        for tick in ticks {
            engine.on_tick(tick, |t| out.push((tick, t)));
        }
        out
    }

    #[test]
    fn test_silent_until_running_and_enabled() {
        let mut engine = RhythmicEngine::new();
        assert!(collect(&mut engine, 1..=48).is_empty());

        engine.start();
        assert!(collect(&mut engine, 1..=48).is_empty());

        engine.set_track_enabled(TrackId::default(), true);
        assert!(!collect(&mut engine, 49..=96).is_empty());
    }

    #[test]
    fn test_each_step_fires_once() {
        let mut engine = RhythmicEngine::new();
        engine.set_track_enabled(TrackId::default(), true);
        engine.start();

        // 16 steps of 12 ticks, hits at 0, 4, 8, 12
        let fired = collect(&mut engine, 1..=191);
        let ticks: Vec<u32> = fired.iter().map(|(tick, _)| *tick).collect();
        assert_eq!(ticks, vec![1, 48, 96, 144]);
        let trigger = fired[0].1;
        assert_eq!(trigger.note, 36);
        assert_eq!(trigger.channel, 1);
        assert_eq!(trigger.length_ms, 100);
        assert_eq!(trigger.voice, VoiceKey::rhythmic(TrackId::default()));
    }

    #[test]
    fn test_tracks_at_different_resolutions() {
        let mut engine = RhythmicEngine::new();
        let second = TrackId::clamped(1);
        engine.set_track_enabled(TrackId::default(), true);
        engine.set_track_enabled(second, true);
        engine.select(second);
        engine.set_resolution(Resolution::Quarter);
        engine.start();

        let fired = collect(&mut engine, 1..=95);
        let from_second = fired
            .iter()
            .filter(|(_, t)| t.voice.track == second)
            .count();
        let from_first = fired.len() - from_second;
        // Quarter: steps 0..3 covered, one hit at step 0. Eighth: steps 0..7, hits at 0 and 4.
        assert_eq!(from_second, 1);
        assert_eq!(from_first, 2);
    }

    #[test]
    fn test_pattern_edit_is_debounced() {
        let mut engine = RhythmicEngine::new();
        engine.update(1_000);
        engine.set_hits(16);
        assert!(!engine.pattern_bit(TrackId::default(), 1));
        engine.update(1_050);
        assert!(!engine.pattern_bit(TrackId::default(), 1));
        engine.update(1_120);
        assert!(engine.pattern_bit(TrackId::default(), 1));
    }

    #[test]
    fn test_edit_cursor_wraps() {
        let mut engine = RhythmicEngine::new();
        engine.prev_edit_param();
        assert_eq!(engine.edit_param(), EditParam::Dub);
        engine.next_edit_param();
        engine.next_edit_param();
        assert_eq!(engine.edit_param(), EditParam::Steps);
    }

    #[test]
    fn test_offset_increment_wraps_user_range() {
        let mut engine = RhythmicEngine::new();
        engine.set_steps(4);
        while engine.edit_param() != EditParam::Offset {
            engine.next_edit_param();
        }
        engine.increment_param(-1);
        assert_eq!(engine.selected_config().offset(), 3);
        engine.increment_param(1);
        assert_eq!(engine.selected_config().offset(), 0);
        engine.increment_param(6);
        assert_eq!(engine.selected_config().offset(), 2);
    }

    #[test]
    fn test_increment_outcomes() {
        let mut engine = RhythmicEngine::new();
        assert_eq!(engine.increment_param(1), EditOutcome::Transport(PlayMode::Play));

        while engine.edit_param() != EditParam::Tempo {
            engine.next_edit_param();
        }
        assert_eq!(engine.increment_param(-3), EditOutcome::TempoDelta(-3));

        engine.next_edit_param();
        engine.increment_param(2);
        assert_eq!(engine.selected_config().note_length_ms(), 200);

        engine.next_edit_param();
        engine.increment_param(1);
        assert!(engine.selected_config().enabled());
    }
}

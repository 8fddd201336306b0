// Control module - one command set for MIDI and OSC, applied to engine state

pub mod cc;
pub mod osc;

use crate::clock::{Clock, SyncMode};
use crate::dispatch::feedback::Param;
use crate::midi::{InputPort, OutputPort, RoutingMatrix};
use crate::sequencer::{
    DistributionMode, EditOutcome, HarmonicEngine, MAX_CHORDS, PlayMode, Resolution,
    RhythmicEngine, ScaleType, TrackId,
};
use std::collections::VecDeque;
use tracing::trace;

pub const BPM_MIN: f32 = 30.0;
pub const BPM_MAX: f32 = 240.0;

/// Encoder events kept for a UI before the oldest is discarded
pub const SURFACE_EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Start,
    Stop,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderEvent {
    DoubleClick,
    LongPress,
    Turn(i32),
}

/// Everything a controller can ask for. Values are already in engine units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    // Selected rhythmic track
    Velocity(i32),
    Steps(i32),
    Hits(i32),
    Offset(i32),
    Note(i32),
    Channel(i32),
    Resolution(Resolution),
    NoteLength(i32),
    SelectTrack(TrackId),
    ToggleDub(TrackId),

    // Clock
    Transport(Transport),
    Tempo(f32),
    SyncMode(SyncMode),

    Encoder(EncoderEvent),

    // Active harmonic track
    HarmonicTonic(i32),
    HarmonicScale(ScaleType),
    HarmonicMode(DistributionMode),
    HarmonicSteps(i32),
    HarmonicHits(i32),
    HarmonicOffset(i32),
    HarmonicPolyphony(i32),
    HarmonicVelocity(i32),
    HarmonicNoteLength(i32),
    HarmonicOctave(i32),
    HarmonicResolution(Resolution),
    HarmonicChannel(i32),
    HarmonicTrack(TrackId),
    HarmonicActive(bool),
    HarmonicToggleActive,
    HarmonicTrackActive(TrackId, bool),

    // Chord list of the active harmonic track
    ChordCount(i32),
    ChordSelect(i32),
    ChordSetSelected(i32),
    ChordInsertSelected(i32),
    ChordDeleteSelected,
    ChordSetAt(usize, i32),
    ChordInsertAt(usize, i32),
    ChordDeleteAt(usize),
    ChordToggle(usize),
    /// Degree given: set the slot, or insert when past the end. No degree: toggle.
    ChordWrite(usize, Option<i32>),
    ToggleChordEdit,

    ToggleRoute(InputPort, OutputPort),
}

/// What the caller still has to do after a command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    /// Resend every harmonic parameter, ignoring the cache
    pub force_harmonic: bool,
}

/// Front-panel state with no engine counterpart
#[derive(Debug, Clone, Default)]
pub struct Surface {
    chord_edit: bool,
    chord_index: u8,
    events: VecDeque<EncoderEvent>,
}

impl Surface {
    pub fn chord_edit(&self) -> bool {
        self.chord_edit
    }

    pub fn chord_index(&self) -> u8 {
        self.chord_index
    }

    pub fn select_chord(&mut self, index: i32) {
        self.chord_index = index.clamp(0, MAX_CHORDS as i32 - 1) as u8;
    }

    pub fn push_event(&mut self, event: EncoderEvent) {
        if self.events.len() >= SURFACE_EVENT_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Oldest first
    pub fn take_events(&mut self) -> Vec<EncoderEvent> {
        self.events.drain(..).collect()
    }
}

/// Engine state shared by every control source
#[derive(Default)]
pub struct EngineState {
    pub rhythmic: RhythmicEngine,
    pub harmonic: HarmonicEngine,
    pub routing: RoutingMatrix,
    pub surface: Surface,
}

fn degree(value: i32) -> u8 {
    value.clamp(0, 6) as u8
}

fn set_tempo(clock: &Clock, bpm: f32) {
    clock.set_sync_mode(SyncMode::Master);
    clock.set_bpm(bpm.clamp(BPM_MIN, BPM_MAX));
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, clock: &Clock, command: Command) -> Applied {
        trace!(?command, "apply");
        let mut applied = Applied::default();

        match command {
            Command::Velocity(v) => self.rhythmic.set_velocity(v),
            Command::Steps(v) => self.rhythmic.set_steps(v),
            Command::Hits(v) => self.rhythmic.set_hits(v),
            Command::Offset(v) => self.rhythmic.set_offset(v),
            Command::Note(v) => self.rhythmic.set_note(v),
            Command::Channel(v) => self.rhythmic.set_channel(v),
            Command::Resolution(r) => self.rhythmic.set_resolution(r),
            Command::NoteLength(v) => self.rhythmic.set_note_length(v),
            Command::SelectTrack(track) => self.rhythmic.select(track),
            Command::ToggleDub(track) => {
                self.rhythmic.toggle_track_enabled(track);
            }

            Command::Transport(transport) => self.transport(clock, transport),
            Command::Tempo(bpm) => set_tempo(clock, bpm),
            Command::SyncMode(mode) => clock.set_sync_mode(mode),

            Command::Encoder(event) => self.encoder(clock, event),

            Command::HarmonicTonic(v) => self.harmonic.set_tonic(v),
            Command::HarmonicScale(scale) => self.harmonic.set_scale(scale),
            Command::HarmonicMode(mode) => self.harmonic.set_mode(mode),
            Command::HarmonicSteps(v) => self.harmonic.set_steps(v),
            Command::HarmonicHits(v) => self.harmonic.set_hits(v),
            Command::HarmonicOffset(v) => self.harmonic.set_offset(v),
            Command::HarmonicPolyphony(v) => self.harmonic.set_polyphony(v),
            Command::HarmonicVelocity(v) => self.harmonic.set_velocity(v),
            Command::HarmonicNoteLength(v) => self.harmonic.set_note_length(v),
            Command::HarmonicOctave(v) => self.harmonic.set_octave(v),
            Command::HarmonicResolution(r) => self.harmonic.set_resolution(r),
            Command::HarmonicChannel(v) => self.harmonic.set_channel(v),
            Command::HarmonicTrack(track) => self.harmonic.set_active_track(track),
            Command::HarmonicActive(on) => self.harmonic.set_active(on),
            Command::HarmonicToggleActive => {
                let on = !self.harmonic.active_config().enabled();
                self.harmonic.set_active(on);
                applied.force_harmonic = true;
            }
            Command::HarmonicTrackActive(track, on) => self.harmonic.set_track_active(track, on),

            Command::ChordCount(count) => {
                self.harmonic
                    .chords_mut()
                    .resize(count.clamp(0, MAX_CHORDS as i32) as usize);
                applied.force_harmonic = true;
            }
            Command::ChordSelect(index) => self.surface.select_chord(index),
            Command::ChordSetSelected(v) => {
                let index = self.surface.chord_index() as usize;
                self.harmonic.chords_mut().set(index, degree(v));
            }
            Command::ChordInsertSelected(v) => {
                let index = self.surface.chord_index() as usize;
                self.harmonic.chords_mut().insert(index, degree(v));
            }
            Command::ChordDeleteSelected => {
                let index = self.surface.chord_index() as usize;
                self.harmonic.chords_mut().remove(index);
            }
            Command::ChordSetAt(index, v) => {
                self.harmonic.chords_mut().set(index, degree(v));
            }
            Command::ChordInsertAt(index, v) => {
                self.harmonic.chords_mut().insert(index, degree(v));
            }
            Command::ChordDeleteAt(index) => {
                self.harmonic.chords_mut().remove(index);
            }
            Command::ChordToggle(index) => {
                self.harmonic.chords_mut().toggle_slot(index);
                applied.force_harmonic = true;
            }
            Command::ChordWrite(index, Some(v)) => {
                let chords = self.harmonic.chords_mut();
                if index < chords.len() {
                    chords.set(index, degree(v));
                } else {
                    chords.insert(index, degree(v));
                }
            }
            Command::ChordWrite(index, None) => self.harmonic.chords_mut().toggle_slot(index),
            Command::ToggleChordEdit => self.surface.chord_edit = !self.surface.chord_edit,

            Command::ToggleRoute(input, output) => {
                self.routing.toggle(input, output);
            }
        }

        applied
    }

    fn transport(&mut self, clock: &Clock, transport: Transport) {
        let start = match transport {
            Transport::Start => true,
            Transport::Stop => false,
            Transport::Toggle => !clock.is_running(),
        };
        if start {
            self.rhythmic.start();
            clock.start();
        } else {
            self.rhythmic.stop();
            clock.stop();
        }
    }

    fn encoder(&mut self, clock: &Clock, event: EncoderEvent) {
        match event {
            EncoderEvent::DoubleClick => self.rhythmic.next_edit_param(),
            EncoderEvent::LongPress => {}
            EncoderEvent::Turn(amount) => match self.rhythmic.increment_param(amount) {
                EditOutcome::Applied => {}
                EditOutcome::Transport(PlayMode::Play) => clock.start(),
                EditOutcome::Transport(PlayMode::Stop) => clock.stop(),
                EditOutcome::TempoDelta(delta) => set_tempo(clock, clock.bpm() + delta as f32),
            },
        }
        self.surface.push_event(event);
    }

    /// Current value of a parameter, in the units the feedback encoders expect
    pub fn feedback_value(&self, clock: &Clock, param: Param) -> i32 {
        let track = self.rhythmic.selected_config();
        let harmonic = self.harmonic.active_config();
        let flag = |on: bool| on as i32;

        match param {
            Param::Velocity => track.velocity() as i32,
            Param::Steps => track.steps() as i32,
            Param::Hits => track.hits() as i32,
            Param::Offset => track.offset() as i32,
            Param::Note => track.note() as i32,
            Param::Channel => track.channel() as i32,
            Param::Resolution => track.resolution().user() as i32,
            Param::Track => self.rhythmic.selected().index() as i32,
            Param::Tempo if clock.is_slave() => -1,
            Param::Tempo => clock.bpm().round() as i32,
            Param::NoteLength => track.note_length_ms() as i32,
            Param::PlayState => flag(clock.is_running()),
            Param::Dub(id) => flag(self.rhythmic.track(id).enabled()),

            Param::HarmonicTonic => harmonic.tonic() as i32,
            Param::HarmonicScale => harmonic.scale().index() as i32,
            Param::HarmonicMode => flag(harmonic.mode() == DistributionMode::Notes),
            Param::HarmonicSteps => harmonic.steps() as i32,
            Param::HarmonicHits => harmonic.hits() as i32,
            Param::HarmonicOffset => harmonic.offset() as i32,
            Param::HarmonicPoly => harmonic.polyphony() as i32,
            Param::HarmonicVelocity => harmonic.velocity() as i32,
            Param::HarmonicNoteLength => harmonic.note_length_ms() as i32,
            Param::HarmonicOctave => harmonic.octave() as i32,
            Param::HarmonicResolution => harmonic.resolution().harmonic_index() as i32,
            Param::HarmonicChannel => harmonic.channel() as i32,
            Param::HarmonicTrack => self.harmonic.active_track().index() as i32,
            Param::HarmonicOn => flag(harmonic.enabled()),
            Param::ChordCount => harmonic.chords.len() as i32,
            Param::ChordSelect => self.surface.chord_index() as i32,
            Param::ChordEdit => flag(self.surface.chord_edit()),
            Param::HarmonicTrackActive(id) => flag(self.harmonic.track(id).enabled()),
            Param::ChordSlot(slot) => flag((slot as usize) < harmonic.chords.len()),
        }
    }

    pub fn feedback_values<'a>(
        &'a self,
        clock: &'a Clock,
    ) -> impl Iterator<Item = (Param, i32)> + 'a {
        Param::all().map(move |param| (param, self.feedback_value(clock, param)))
    }

    pub fn harmonic_feedback_values<'a>(
        &'a self,
        clock: &'a Clock,
    ) -> impl Iterator<Item = (Param, i32)> + 'a {
        Param::harmonic().map(move |param| (param, self.feedback_value(clock, param)))
    }
}

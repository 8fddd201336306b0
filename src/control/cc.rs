// CC/Note mapping - control-channel messages to commands

use super::{Command, EncoderEvent, Transport};
use crate::clock::SyncMode;
use crate::midi::MidiEvent;
use crate::sequencer::{DistributionMode, Resolution, ScaleType, TrackId, scale::SCALE_COUNT};

/// MIDI channel index carrying control messages (channel 10 on the wire)
pub const CONTROL_CHANNEL: u8 = 9;

/// Controller numbers on the control channel
pub mod controller {
    pub const VELOCITY: u8 = 19;
    pub const STEPS: u8 = 20;
    pub const HITS: u8 = 21;
    pub const OFFSET: u8 = 22;
    pub const NOTE: u8 = 23;
    pub const CHANNEL: u8 = 24;
    pub const RESOLUTION: u8 = 25;
    pub const TRACK: u8 = 26;
    pub const TEMPO: u8 = 28;
    pub const NOTE_LENGTH: u8 = 31;

    pub const HARM_TONIC: u8 = 40;
    pub const HARM_SCALE: u8 = 41;
    pub const HARM_MODE: u8 = 42;
    pub const HARM_STEPS: u8 = 43;
    pub const HARM_HITS: u8 = 44;
    pub const HARM_OFFSET: u8 = 45;
    pub const HARM_POLY: u8 = 46;
    pub const HARM_VELOCITY: u8 = 47;
    pub const HARM_NOTE_LENGTH: u8 = 48;
    pub const HARM_OCTAVE: u8 = 49;
    pub const HARM_CHORD_SELECT: u8 = 50;
    pub const HARM_CHORD_SET: u8 = 51;
    pub const HARM_CHORD_INSERT: u8 = 52;
    pub const HARM_CHORD_DELETE: u8 = 53;
    pub const HARM_RESOLUTION: u8 = 58;
}

/// Note numbers on the control channel (Note On, velocity > 0)
pub mod note {
    pub const PLAY_STOP: u8 = 0;
    pub const ENCODER_DOUBLE_CLICK: u8 = 49;
    pub const ENCODER_LONG_PRESS: u8 = 50;
    /// Tracks 0..7 on 76..83
    pub const DUB_BASE: u8 = 76;
    /// Inside the dub range, so dub wins
    pub const GROUP: u8 = 78;
    pub const HARMONIC_TOGGLE: u8 = 90;
    pub const CHORD_EDIT: u8 = 91;
    /// Chord slots 0..7 on 92..99
    pub const CHORD_SLOT_BASE: u8 = 92;
}

/// Integer linear rescale, truncating toward zero
pub fn arduino_map(x: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    if in_max == in_min {
        return out_min;
    }
    let scaled =
        (x as i64 - in_min as i64) * (out_max as i64 - out_min as i64) / (in_max as i64 - in_min as i64);
    (scaled + out_min as i64) as i32
}

/// `arduino_map` clamped to the output range
pub fn map_clamped(x: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    let (lo, hi) = if out_min <= out_max {
        (out_min, out_max)
    } else {
        (out_max, out_min)
    };
    arduino_map(x, in_min, in_max, out_min, out_max).clamp(lo, hi)
}

fn from_cc(value: u8, out_min: i32, out_max: i32) -> i32 {
    map_clamped(value as i32, 0, 127, out_min, out_max)
}

/// Translate a control-channel message; anything else yields `None`
pub fn translate(event: &MidiEvent) -> Option<Command> {
    match *event {
        MidiEvent::ControlChange {
            channel,
            controller,
            value,
        } if channel == CONTROL_CHANNEL => translate_cc(controller, value),
        MidiEvent::NoteOn {
            channel,
            note,
            velocity,
        } if channel == CONTROL_CHANNEL && velocity > 0 => translate_note(note),
        _ => None,
    }
}

pub fn translate_cc(cc: u8, value: u8) -> Option<Command> {
    use controller::*;

    let command = match cc {
        VELOCITY => Command::Velocity(value as i32),
        STEPS => Command::Steps(from_cc(value, 1, 32)),
        HITS => Command::Hits(from_cc(value, 1, 32)),
        OFFSET => Command::Offset(from_cc(value, 0, 31)),
        NOTE => Command::Note(value as i32),
        CHANNEL => Command::Channel(from_cc(value, 0, 15)),
        RESOLUTION => Command::Resolution(Resolution::from_user(from_cc(value, 1, 4))),
        TRACK => Command::SelectTrack(TrackId::clamped(from_cc(value, 0, 7))),
        TEMPO if value >= 127 => Command::SyncMode(SyncMode::Slave),
        TEMPO => Command::Tempo(from_cc(value, 30, 240) as f32),
        NOTE_LENGTH => Command::NoteLength(from_cc(value, 50, 700)),

        HARM_TONIC => Command::HarmonicTonic(from_cc(value, 0, 11)),
        HARM_SCALE => {
            Command::HarmonicScale(ScaleType::clamped(from_cc(value, 0, SCALE_COUNT as i32 - 1)))
        }
        HARM_MODE => Command::HarmonicMode(if value < 64 {
            DistributionMode::Chords
        } else {
            DistributionMode::Notes
        }),
        HARM_STEPS => Command::HarmonicSteps(from_cc(value, 1, 32)),
        HARM_HITS => Command::HarmonicHits(from_cc(value, 1, 32)),
        HARM_OFFSET => Command::HarmonicOffset(from_cc(value, 0, 31)),
        HARM_POLY => Command::HarmonicPolyphony(from_cc(value, 1, 8)),
        HARM_VELOCITY => Command::HarmonicVelocity(value as i32),
        HARM_NOTE_LENGTH => Command::HarmonicNoteLength(from_cc(value, 10, 2000)),
        HARM_OCTAVE => Command::HarmonicOctave(from_cc(value, -2, 2)),
        HARM_CHORD_SELECT => Command::ChordSelect(from_cc(value, 0, 15)),
        HARM_CHORD_SET => Command::ChordSetSelected(from_cc(value, 0, 6)),
        HARM_CHORD_INSERT => Command::ChordInsertSelected(from_cc(value, 0, 6)),
        HARM_CHORD_DELETE => Command::ChordDeleteSelected,
        HARM_RESOLUTION => Command::HarmonicResolution(Resolution::from_harmonic_index(from_cc(value, 0, 2))),
        _ => return None,
    };
    Some(command)
}

pub fn translate_note(number: u8) -> Option<Command> {
    use note::*;

    let command = match number {
        PLAY_STOP => Command::Transport(Transport::Toggle),
        ENCODER_DOUBLE_CLICK => Command::Encoder(EncoderEvent::DoubleClick),
        ENCODER_LONG_PRESS => Command::Encoder(EncoderEvent::LongPress),
        n if (DUB_BASE..DUB_BASE + 8).contains(&n) => {
            Command::ToggleDub(TrackId::clamped((n - DUB_BASE) as i32))
        }
        HARMONIC_TOGGLE => Command::HarmonicToggleActive,
        CHORD_EDIT => Command::ToggleChordEdit,
        n if (CHORD_SLOT_BASE..CHORD_SLOT_BASE + 8).contains(&n) => {
            Command::ChordToggle((n - CHORD_SLOT_BASE) as usize)
        }
        _ => return None,
    };
    Some(command)
}

// OSC mapping - path-addressed messages to commands, and the shared path names

use super::{Command, EncoderEvent, Transport};
use crate::clock::SyncMode;
use crate::midi::{InputPort, OutputPort};
use crate::sequencer::{DistributionMode, Resolution, ScaleType, TrackId, scale::SCALE_COUNT};
use rosc::OscType;

pub mod path {
    pub const STEPS: &str = "/sequencer/steps";
    pub const HITS: &str = "/sequencer/hits";
    pub const OFFSET: &str = "/sequencer/offset";
    pub const NOTE: &str = "/sequencer/note";
    pub const VELOCITY: &str = "/sequencer/velocity";
    pub const CHANNEL: &str = "/sequencer/channel";
    pub const RESOLUTION: &str = "/sequencer/resolution";
    pub const TRACK: &str = "/sequencer/track";
    pub const PLAY_STOP: &str = "/sequencer/playstop";
    pub const TEMPO: &str = "/sequencer/tempo";
    pub const NOTE_LENGTH: &str = "/sequencer/note_length";
    pub const DUB_BASE: &str = "/sequencer/dub/";
    pub const ENCODER_DOUBLE_CLICK: &str = "/encoder/double_click";
    pub const ENCODER_LONG_PRESS: &str = "/encoder/long_press";

    pub const HARM_TONALITY: &str = "/harmonic/tonality";
    pub const HARM_SCALE: &str = "/harmonic/scale";
    pub const HARM_SCALE_NAME: &str = "/harmonic/scale/name";
    pub const HARM_MODE: &str = "/harmonic/mode";
    pub const HARM_STEPS: &str = "/harmonic/steps";
    pub const HARM_HITS: &str = "/harmonic/hits";
    pub const HARM_OFFSET: &str = "/harmonic/offset";
    pub const HARM_POLY: &str = "/harmonic/poly";
    pub const HARM_VELOCITY: &str = "/harmonic/velocity";
    pub const HARM_NOTE_LENGTH: &str = "/harmonic/note_length";
    pub const HARM_OCTAVE: &str = "/harmonic/octave";
    pub const HARM_ACTIVE: &str = "/harmonic/active";
    pub const HARM_ACTIVE_BASE: &str = "/harmonic/active/";
    pub const HARM_TRACK: &str = "/harmonic/track";
    pub const HARM_RESOLUTION: &str = "/harmonic/resolution";
    pub const HARM_CHANNEL: &str = "/harmonic/channel";
    pub const CHORDS_COUNT: &str = "/harmonic/chords/count";
    pub const CHORDS_SELECT: &str = "/harmonic/chords/select";
    pub const CHORDS_SET: &str = "/harmonic/chords/set";
    pub const CHORDS_INSERT: &str = "/harmonic/chords/insert";
    pub const CHORDS_DELETE: &str = "/harmonic/chords/delete";
    pub const CHORDS_TOGGLE: &str = "/harmonic/chords/toggle";
    pub const CHORD_BASE: &str = "/harmonic/chord/";
    pub const ROUTING_BASE: &str = "/routing/";
}

/// Numeric view of an argument; strings and blobs have none
pub fn arg_value(arg: &OscType) -> Option<f32> {
    match arg {
        OscType::Float(v) => Some(*v),
        OscType::Double(v) => Some(*v as f32),
        OscType::Int(v) => Some(*v as f32),
        OscType::Long(v) => Some(*v as f32),
        OscType::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Argument `index` truncated toward zero then clamped
fn int_arg(args: &[OscType], index: usize, min: i32, max: i32) -> Option<i32> {
    args.get(index)
        .and_then(arg_value)
        .map(|v| (v as i32).clamp(min, max))
}

fn raw_arg(args: &[OscType], index: usize) -> Option<f32> {
    args.get(index).and_then(arg_value)
}

/// Translate one incoming message; unknown paths and missing arguments yield `None`
pub fn translate(addr: &str, args: &[OscType]) -> Option<Command> {
    use path::*;

    let command = match addr {
        STEPS => Command::Steps(int_arg(args, 0, 1, 32)?),
        HITS => Command::Hits(int_arg(args, 0, 1, 32)?),
        OFFSET => Command::Offset(int_arg(args, 0, 0, 31)?),
        NOTE => Command::Note(int_arg(args, 0, 0, 127)?),
        VELOCITY => Command::Velocity(int_arg(args, 0, 0, 127)?),
        CHANNEL => Command::Channel(int_arg(args, 0, 0, 15)?),
        RESOLUTION => Command::Resolution(Resolution::from_user(int_arg(args, 0, 1, 4)?)),
        TRACK => Command::SelectTrack(TrackId::clamped(int_arg(args, 0, 0, 7)?)),
        NOTE_LENGTH => Command::NoteLength(int_arg(args, 0, 50, 700)?),
        PLAY_STOP => {
            // Stop is read last and wins over start
            let start = raw_arg(args, 0).is_some_and(|v| v > 0.0);
            let stop = raw_arg(args, 1).is_some_and(|v| v > 0.0);
            if stop {
                Command::Transport(Transport::Stop)
            } else if start {
                Command::Transport(Transport::Start)
            } else {
                return None;
            }
        }
        TEMPO => {
            let bpm = raw_arg(args, 0)?;
            if bpm < 0.0 {
                Command::SyncMode(SyncMode::Slave)
            } else {
                Command::Tempo(bpm.clamp(30.0, 240.0))
            }
        }
        ENCODER_DOUBLE_CLICK => Command::Encoder(EncoderEvent::DoubleClick),
        ENCODER_LONG_PRESS => Command::Encoder(EncoderEvent::LongPress),

        HARM_TONALITY => Command::HarmonicTonic(int_arg(args, 0, 0, 11)?),
        HARM_SCALE => {
            Command::HarmonicScale(ScaleType::clamped(int_arg(args, 0, 0, SCALE_COUNT as i32 - 1)?))
        }
        HARM_MODE => Command::HarmonicMode(if raw_arg(args, 0)? >= 1.0 {
            DistributionMode::Notes
        } else {
            DistributionMode::Chords
        }),
        HARM_STEPS => Command::HarmonicSteps(int_arg(args, 0, 1, 32)?),
        HARM_HITS => Command::HarmonicHits(int_arg(args, 0, 1, 32)?),
        HARM_OFFSET => Command::HarmonicOffset(int_arg(args, 0, 0, 31)?),
        HARM_POLY => Command::HarmonicPolyphony(int_arg(args, 0, 1, 8)?),
        HARM_VELOCITY => Command::HarmonicVelocity(int_arg(args, 0, 0, 127)?),
        HARM_NOTE_LENGTH => Command::HarmonicNoteLength(int_arg(args, 0, 10, 2000)?),
        HARM_OCTAVE => Command::HarmonicOctave(int_arg(args, 0, -2, 2)?),
        HARM_ACTIVE => Command::HarmonicActive(raw_arg(args, 0)? != 0.0),
        HARM_TRACK => Command::HarmonicTrack(TrackId::clamped(int_arg(args, 0, 1, 8)? - 1)),
        HARM_RESOLUTION => {
            Command::HarmonicResolution(Resolution::from_harmonic_index(int_arg(args, 0, 0, 2)?))
        }
        HARM_CHANNEL => Command::HarmonicChannel(int_arg(args, 0, 0, 15)?),

        CHORDS_COUNT => Command::ChordCount(int_arg(args, 0, 0, 16)?),
        CHORDS_SELECT => Command::ChordSelect(int_arg(args, 0, 0, 15)?),
        CHORDS_SET => {
            let (index, degree) = index_and_degree(args)?;
            Command::ChordSetAt(index, degree)
        }
        CHORDS_INSERT => {
            let (index, degree) = index_and_degree(args)?;
            Command::ChordInsertAt(index, degree)
        }
        CHORDS_DELETE => Command::ChordDeleteAt(int_arg(args, 0, 0, 15)? as usize),
        CHORDS_TOGGLE => {
            let index = raw_arg(args, 0)? as i32;
            if !(0..16).contains(&index) {
                return None;
            }
            Command::ChordToggle(index as usize)
        }

        other => return translate_indexed(other, args),
    };
    Some(command)
}

fn index_and_degree(args: &[OscType]) -> Option<(usize, i32)> {
    let index = raw_arg(args, 0)? as i32;
    let degree = int_arg(args, 1, 0, 6)?;
    if index < 0 {
        return None;
    }
    Some((index as usize, degree))
}

/// Paths carrying an index or port names in the address
fn translate_indexed(addr: &str, args: &[OscType]) -> Option<Command> {
    if let Some(suffix) = addr.strip_prefix(path::DUB_BASE) {
        let track = TrackId::new(suffix.parse().ok()?)?;
        return Some(Command::ToggleDub(track));
    }
    if let Some(suffix) = addr.strip_prefix(path::HARM_ACTIVE_BASE) {
        let track = TrackId::from_number(suffix.parse().ok()?)?;
        let on = raw_arg(args, 0)? != 0.0;
        return Some(Command::HarmonicTrackActive(track, on));
    }
    if let Some(suffix) = addr.strip_prefix(path::CHORD_BASE) {
        let index: usize = suffix.parse().ok()?;
        let degree = int_arg(args, 0, 0, 6);
        return Some(Command::ChordWrite(index, degree));
    }
    if let Some(suffix) = addr.strip_prefix(path::ROUTING_BASE) {
        let (input, output) = suffix.split_once('/')?;
        let input = InputPort::from_path_name(input)?;
        let output = OutputPort::from_path_name(output)?;
        return Some(Command::ToggleRoute(input, output));
    }
    None
}

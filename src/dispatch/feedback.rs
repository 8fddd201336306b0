// Feedback dispatcher - last-sent cache, MIDI/OSC encodings and the send worker

use super::SharedOutputs;
use super::queue::{self, PushOutcome, QueueConsumer, QueueProducer};
use crate::control::cc::{CONTROL_CHANNEL, controller, map_clamped, note};
use crate::control::osc::path;
use crate::midi::{OutputSink, write_to_set};
use crate::sequencer::{MAX_TRACKS, ScaleType, TrackId};
use rosc::{OscMessage, OscType};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

pub const FEEDBACK_QUEUE_CAPACITY: usize = 128;

/// Chord slots mirrored as toggles
pub const CHORD_SLOT_FLAGS: u8 = 8;

/// Every observable parameter. Values are in engine units (steps 1..32,
/// track index 0..7, tempo in BPM or -1 in Slave, flags 0/1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Velocity,
    Steps,
    Hits,
    Offset,
    Note,
    Channel,
    Resolution,
    Track,
    Tempo,
    NoteLength,
    PlayState,
    Dub(TrackId),
    HarmonicTonic,
    HarmonicScale,
    HarmonicMode,
    HarmonicSteps,
    HarmonicHits,
    HarmonicOffset,
    HarmonicPoly,
    HarmonicVelocity,
    HarmonicNoteLength,
    HarmonicOctave,
    HarmonicResolution,
    HarmonicChannel,
    HarmonicTrack,
    HarmonicOn,
    ChordCount,
    ChordSelect,
    ChordEdit,
    HarmonicTrackActive(TrackId),
    ChordSlot(u8),
}

const RHYTHMIC_SCALARS: [Param; 11] = [
    Param::Velocity,
    Param::Steps,
    Param::Hits,
    Param::Offset,
    Param::Note,
    Param::Channel,
    Param::Resolution,
    Param::Track,
    Param::Tempo,
    Param::NoteLength,
    Param::PlayState,
];

const HARMONIC_SCALARS: [Param; 17] = [
    Param::HarmonicTonic,
    Param::HarmonicScale,
    Param::HarmonicMode,
    Param::HarmonicSteps,
    Param::HarmonicHits,
    Param::HarmonicOffset,
    Param::HarmonicPoly,
    Param::HarmonicVelocity,
    Param::HarmonicNoteLength,
    Param::HarmonicOctave,
    Param::HarmonicResolution,
    Param::HarmonicChannel,
    Param::HarmonicTrack,
    Param::HarmonicOn,
    Param::ChordCount,
    Param::ChordSelect,
    Param::ChordEdit,
];

const DUB_BASE: usize = RHYTHMIC_SCALARS.len();
const HARMONIC_BASE: usize = DUB_BASE + MAX_TRACKS;
const TRACK_ACTIVE_BASE: usize = HARMONIC_BASE + HARMONIC_SCALARS.len();
const CHORD_SLOT_BASE: usize = TRACK_ACTIVE_BASE + MAX_TRACKS;

pub const PARAM_COUNT: usize = CHORD_SLOT_BASE + CHORD_SLOT_FLAGS as usize;

impl Param {
    /// Dense index into the cache
    pub fn index(self) -> usize {
        match self {
            Param::Dub(track) => DUB_BASE + track.index(),
            Param::HarmonicTrackActive(track) => TRACK_ACTIVE_BASE + track.index(),
            Param::ChordSlot(slot) => CHORD_SLOT_BASE + (slot.min(CHORD_SLOT_FLAGS - 1)) as usize,
            scalar => match RHYTHMIC_SCALARS.iter().position(|p| *p == scalar) {
                Some(i) => i,
                None => {
                    HARMONIC_BASE + HARMONIC_SCALARS.iter().position(|p| *p == scalar).unwrap_or(0)
                }
            },
        }
    }

    pub fn is_harmonic(self) -> bool {
        self.index() >= HARMONIC_BASE
    }

    /// Rhythmic parameters: selected track, transport and dub flags
    pub fn rhythmic() -> impl Iterator<Item = Param> {
        RHYTHMIC_SCALARS
            .into_iter()
            .chain(TrackId::all().map(Param::Dub))
    }

    /// Harmonic parameters: active track, per-track activity and chord slots
    pub fn harmonic() -> impl Iterator<Item = Param> {
        HARMONIC_SCALARS
            .into_iter()
            .chain(TrackId::all().map(Param::HarmonicTrackActive))
            .chain((0..CHORD_SLOT_FLAGS).map(Param::ChordSlot))
    }

    pub fn all() -> impl Iterator<Item = Param> {
        Self::rhythmic().chain(Self::harmonic())
    }

    /// Three-byte message on the control channel, if the parameter has one
    pub fn midi_bytes(self, value: i32) -> Option<[u8; 3]> {
        use controller::*;

        let cc = |number: u8, v: i32| Some([0xB0 | CONTROL_CHANNEL, number, v.clamp(0, 127) as u8]);
        let flag = |number: u8, v: i32| {
            Some(if v != 0 {
                [0x90 | CONTROL_CHANNEL, number, 127]
            } else {
                [0x80 | CONTROL_CHANNEL, number, 0]
            })
        };

        match self {
            Param::Velocity => cc(VELOCITY, value),
            Param::Steps => cc(STEPS, map_clamped(value, 1, 32, 0, 127)),
            Param::Hits => cc(HITS, map_clamped(value, 1, 32, 0, 127)),
            // Offset is shown 1-based on controllers
            Param::Offset => cc(OFFSET, map_clamped(value + 1, 1, 32, 0, 127)),
            Param::Note => cc(NOTE, value),
            Param::Channel => cc(CHANNEL, map_clamped(value, 0, 15, 0, 127)),
            Param::Resolution => cc(RESOLUTION, map_clamped(value, 1, 4, 0, 127)),
            Param::Track => cc(TRACK, map_clamped(value, 0, 7, 0, 127)),
            Param::Tempo if value < 0 => cc(TEMPO, 127),
            Param::Tempo => cc(TEMPO, map_clamped(value, 30, 240, 0, 126)),
            Param::NoteLength => cc(NOTE_LENGTH, map_clamped(value, 50, 700, 0, 127)),
            Param::PlayState => flag(note::PLAY_STOP, value),
            Param::Dub(track) => flag(note::DUB_BASE + track.index() as u8, value),

            Param::HarmonicTonic => cc(HARM_TONIC, value),
            Param::HarmonicScale => cc(HARM_SCALE, value),
            Param::HarmonicMode => cc(HARM_MODE, if value != 0 { 127 } else { 0 }),
            Param::HarmonicSteps => cc(HARM_STEPS, map_clamped(value, 1, 32, 0, 127)),
            Param::HarmonicHits => cc(HARM_HITS, map_clamped(value, 1, 32, 0, 127)),
            Param::HarmonicOffset => cc(HARM_OFFSET, map_clamped(value, 0, 31, 0, 127)),
            Param::HarmonicPoly => cc(HARM_POLY, map_clamped(value, 1, 5, 0, 127)),
            Param::HarmonicVelocity => cc(HARM_VELOCITY, value),
            Param::HarmonicNoteLength => cc(HARM_NOTE_LENGTH, map_clamped(value, 10, 2000, 0, 127)),
            Param::HarmonicOctave => cc(HARM_OCTAVE, map_clamped(value, -2, 2, 0, 127)),
            Param::HarmonicResolution => cc(HARM_RESOLUTION, map_clamped(value, 0, 2, 0, 127)),
            Param::ChordSelect => cc(HARM_CHORD_SELECT, map_clamped(value, 0, 15, 0, 127)),
            Param::HarmonicOn => flag(note::HARMONIC_TOGGLE, value),
            Param::ChordEdit => flag(note::CHORD_EDIT, value),
            Param::ChordSlot(slot) => flag(note::CHORD_SLOT_BASE + slot, value),
            Param::HarmonicChannel
            | Param::HarmonicTrack
            | Param::HarmonicTrackActive(_)
            | Param::ChordCount => None,
        }
    }

    /// OSC messages mirroring the parameter (zero, one or two)
    pub fn osc_messages(self, value: i32) -> Vec<OscMessage> {
        let int = |addr: &str, v: i32| vec![message(addr, vec![OscType::Int(v)])];

        match self {
            Param::Velocity => int(path::VELOCITY, value),
            Param::Steps => int(path::STEPS, value),
            Param::Hits => int(path::HITS, value),
            Param::Offset => int(path::OFFSET, value),
            Param::Note => int(path::NOTE, value),
            Param::Channel => int(path::CHANNEL, value),
            Param::Resolution => int(path::RESOLUTION, value),
            Param::Track => int(path::TRACK, value),
            Param::Tempo => vec![message(path::TEMPO, vec![OscType::Float(value as f32)])],
            Param::NoteLength => int(path::NOTE_LENGTH, value),
            Param::PlayState => {
                let running = (value != 0) as i32;
                vec![message(
                    path::PLAY_STOP,
                    vec![OscType::Int(running), OscType::Int(1 - running)],
                )]
            }
            Param::Dub(track) => int(&format!("{}{}", path::DUB_BASE, track.index()), value),

            Param::HarmonicTonic => int(path::HARM_TONALITY, value),
            Param::HarmonicScale => {
                let name = ScaleType::clamped(value).name().to_string();
                vec![
                    message(
                        path::HARM_SCALE,
                        vec![OscType::Int(value), OscType::String(name.clone())],
                    ),
                    message(path::HARM_SCALE_NAME, vec![OscType::String(name)]),
                ]
            }
            Param::HarmonicMode => int(path::HARM_MODE, value),
            Param::HarmonicSteps => int(path::HARM_STEPS, value),
            Param::HarmonicHits => int(path::HARM_HITS, value),
            Param::HarmonicOffset => int(path::HARM_OFFSET, value),
            Param::HarmonicPoly => int(path::HARM_POLY, value),
            Param::HarmonicVelocity => int(path::HARM_VELOCITY, value),
            Param::HarmonicNoteLength => int(path::HARM_NOTE_LENGTH, value),
            Param::HarmonicOctave => int(path::HARM_OCTAVE, value),
            Param::HarmonicResolution => int(path::HARM_RESOLUTION, value),
            Param::HarmonicChannel => int(path::HARM_CHANNEL, value),
            // Harmonic tracks are numbered from 1 on the network
            Param::HarmonicTrack => int(path::HARM_TRACK, value + 1),
            Param::HarmonicOn => int(path::HARM_ACTIVE, value),
            Param::HarmonicTrackActive(track) => int(
                &format!("{}{}", path::HARM_ACTIVE_BASE, track.number()),
                value,
            ),
            Param::ChordCount => int(path::CHORDS_COUNT, value),
            Param::ChordSelect => int(path::CHORDS_SELECT, value),
            Param::ChordEdit | Param::ChordSlot(_) => Vec::new(),
        }
    }
}

fn message(addr: &str, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: addr.to_string(),
        args,
    }
}

/// Last value sent per parameter
#[derive(Debug, Clone)]
pub struct FeedbackCache {
    values: [Option<i32>; PARAM_COUNT],
}

impl FeedbackCache {
    pub fn new() -> Self {
        Self {
            values: [None; PARAM_COUNT],
        }
    }

    pub fn get(&self, param: Param) -> Option<i32> {
        self.values[param.index()]
    }

    pub fn set(&mut self, param: Param, value: i32) {
        self.values[param.index()] = Some(value);
    }

    pub fn matches(&self, param: Param, value: i32) -> bool {
        self.get(param) == Some(value)
    }

    pub fn reset(&mut self) {
        self.values = [None; PARAM_COUNT];
    }
}

impl Default for FeedbackCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackMessage {
    Midi([u8; 3]),
    Osc(OscMessage),
}

/// Broadcast target for OSC feedback
pub trait OscOutput: Send + Sync {
    fn broadcast(&self, message: &OscMessage);
}

pub struct FeedbackDispatcher {
    cache: FeedbackCache,
    queue: QueueProducer<FeedbackMessage>,
    midi_enabled: bool,
    osc_enabled: bool,
}

impl FeedbackDispatcher {
    pub fn new(queue: QueueProducer<FeedbackMessage>) -> Self {
        Self {
            cache: FeedbackCache::new(),
            queue,
            midi_enabled: true,
            osc_enabled: true,
        }
    }

    pub fn with_capacity(capacity: usize) -> (Self, QueueConsumer<FeedbackMessage>) {
        let (producer, consumer) = queue::bounded("feedback", capacity);
        (Self::new(producer), consumer)
    }

    pub fn set_midi_enabled(&mut self, enabled: bool) {
        self.midi_enabled = enabled;
    }

    pub fn set_osc_enabled(&mut self, enabled: bool) {
        self.osc_enabled = enabled;
    }

    /// Send only when `value` differs from the last value sent
    pub fn send_if_changed(&mut self, param: Param, value: i32) -> bool {
        if self.cache.matches(param, value) {
            return false;
        }
        self.cache.set(param, value);
        self.emit(param, value);
        true
    }

    /// Send regardless of the cache, then record the value
    pub fn send_forced(&mut self, param: Param, value: i32) {
        self.emit(param, value);
        self.cache.set(param, value);
    }

    /// Send each pair that changed; returns how many were sent
    pub fn sync(&mut self, values: impl IntoIterator<Item = (Param, i32)>) -> usize {
        values
            .into_iter()
            .filter(|(param, value)| self.send_if_changed(*param, *value))
            .count()
    }

    /// Full snapshot: every pair is sent and the cache refreshed
    pub fn send_all_forced(&mut self, values: impl IntoIterator<Item = (Param, i32)>) -> usize {
        let mut sent = 0;
        for (param, value) in values {
            self.send_forced(param, value);
            sent += 1;
        }
        sent
    }

    pub fn reset_cache(&mut self) {
        self.cache.reset();
    }

    pub fn cache(&self) -> &FeedbackCache {
        &self.cache
    }

    pub fn dropped(&self) -> u32 {
        self.queue.dropped()
    }

    fn emit(&mut self, param: Param, value: i32) {
        match param.midi_bytes(value) {
            Some(bytes) if self.midi_enabled => {
                self.push(FeedbackMessage::Midi(bytes));
            }
            _ => {}
        }
        if self.osc_enabled {
            for message in param.osc_messages(value) {
                self.push(FeedbackMessage::Osc(message));
            }
        }
    }

    fn push(&mut self, message: FeedbackMessage) -> PushOutcome {
        self.queue.try_push(message)
    }
}

/// Deliver every queued message; returns how many
pub fn drain_feedback(
    queue: &mut QueueConsumer<FeedbackMessage>,
    sink: &dyn OutputSink,
    outputs: &SharedOutputs,
    osc: Option<&dyn OscOutput>,
) -> usize {
    let mut sent = 0;
    while let Some(message) = queue.try_pop() {
        match message {
            FeedbackMessage::Midi(bytes) => write_to_set(sink, outputs.get(), &bytes),
            FeedbackMessage::Osc(message) => {
                if let Some(osc) = osc {
                    osc.broadcast(&message);
                }
            }
        }
        sent += 1;
    }
    sent
}

pub struct FeedbackWorker {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl FeedbackWorker {
    const WAIT_TIMEOUT: Duration = Duration::from_millis(50);

    pub fn spawn(
        mut queue: QueueConsumer<FeedbackMessage>,
        sink: Arc<dyn OutputSink>,
        outputs: Arc<SharedOutputs>,
        osc: Option<Arc<dyn OscOutput>>,
    ) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = thread::Builder::new()
            .name("feedback-dispatch".into())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    queue.wait(Self::WAIT_TIMEOUT);
                    drain_feedback(&mut queue, sink.as_ref(), &outputs, osc.as_deref());
                }
                drain_feedback(&mut queue, sink.as_ref(), &outputs, osc.as_deref());
                debug!("feedback worker stopped");
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FeedbackWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Note dispatcher - note queue, pending note-off table and the worker draining it

use super::queue::{self, PushOutcome, QueueConsumer, QueueProducer};
use super::SharedOutputs;
use crate::midi::{OutputSink, write_to_set};
use crate::sequencer::{Lane, MAX_POLYPHONY, MAX_TRACKS, NoteTrigger, VoiceKey};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

pub const NOTE_QUEUE_CAPACITY: usize = 512;
pub const NOTE_LENGTH_MIN_MS: u16 = 50;
pub const NOTE_LENGTH_MAX_MS: u16 = 2000;

/// Queue element: one note-on or note-off ready for the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub length_ms: u16,
    pub on: bool,
}

impl NoteEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8, length_ms: u16) -> Self {
        Self {
            channel,
            note,
            velocity,
            length_ms,
            on: true,
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            channel,
            note,
            velocity,
            length_ms: 0,
            on: false,
        }
    }

    /// Wire ranges: channel 0..15, data bytes 0..127, length 50..2000 ms
    pub fn sanitized(self) -> Self {
        Self {
            channel: self.channel & 0x0F,
            note: self.note & 0x7F,
            velocity: self.velocity & 0x7F,
            length_ms: if self.on {
                self.length_ms.clamp(NOTE_LENGTH_MIN_MS, NOTE_LENGTH_MAX_MS)
            } else {
                self.length_ms
            },
            on: self.on,
        }
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        let status = if self.on { 0x90 } else { 0x80 };
        [status | (self.channel & 0x0F), self.note & 0x7F, self.velocity & 0x7F]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingNoteOff {
    pub note: u8,
    pub channel: u8,
    pub velocity: u8,
    pub due_ms: u64,
}

impl PendingNoteOff {
    pub fn to_event(&self) -> NoteEvent {
        NoteEvent::note_off(self.channel, self.note, self.velocity)
    }
}

/// One live slot per voice: 8 rhythmic tracks x 1, 8 harmonic tracks x 5
#[derive(Debug, Default)]
pub struct NoteOffTable {
    rhythmic: [Option<PendingNoteOff>; MAX_TRACKS],
    harmonic: [[Option<PendingNoteOff>; MAX_POLYPHONY]; MAX_TRACKS],
}

impl NoteOffTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, voice: VoiceKey) -> Option<&mut Option<PendingNoteOff>> {
        match voice.lane {
            Lane::Rhythmic => self.rhythmic.get_mut(voice.track.index()),
            Lane::Harmonic => self
                .harmonic
                .get_mut(voice.track.index())
                .and_then(|voices| voices.get_mut(voice.voice as usize)),
        }
    }

    /// Store a note-off, returning the one it displaced
    pub fn replace(&mut self, voice: VoiceKey, off: PendingNoteOff) -> Option<PendingNoteOff> {
        self.slot_mut(voice).and_then(|slot| slot.replace(off))
    }

    pub fn get(&self, voice: VoiceKey) -> Option<PendingNoteOff> {
        match voice.lane {
            Lane::Rhythmic => self.rhythmic.get(voice.track.index()).copied().flatten(),
            Lane::Harmonic => self
                .harmonic
                .get(voice.track.index())
                .and_then(|voices| voices.get(voice.voice as usize))
                .copied()
                .flatten(),
        }
    }

    fn slots_mut(&mut self) -> impl Iterator<Item = &mut Option<PendingNoteOff>> {
        self.rhythmic
            .iter_mut()
            .chain(self.harmonic.iter_mut().flat_map(|voices| voices.iter_mut()))
    }

    /// Hand every slot due at `now_ms` to `deliver`; a slot is freed only when it returns true
    pub fn take_due(&mut self, now_ms: u64, mut deliver: impl FnMut(PendingNoteOff) -> bool) {
        for slot in self.slots_mut() {
            match *slot {
                Some(off) if now_ms >= off.due_ms && deliver(off) => *slot = None,
                _ => {}
            }
        }
    }

    /// Same as `take_due` for every live slot
    pub fn take_all(&mut self, mut deliver: impl FnMut(PendingNoteOff) -> bool) {
        for slot in self.slots_mut() {
            match *slot {
                Some(off) if deliver(off) => *slot = None,
                _ => {}
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.rhythmic.iter().filter(|s| s.is_some()).count()
            + self
                .harmonic
                .iter()
                .flat_map(|voices| voices.iter())
                .filter(|s| s.is_some())
                .count()
    }
}

/// Trigger side of the note path. Owned by the core, fed from clock context.
pub struct NoteDispatcher {
    queue: QueueProducer<NoteEvent>,
    pending: NoteOffTable,
}

impl NoteDispatcher {
    pub fn new(queue: QueueProducer<NoteEvent>) -> Self {
        Self {
            queue,
            pending: NoteOffTable::new(),
        }
    }

    /// Dispatcher plus the consumer half for a worker
    pub fn with_capacity(capacity: usize) -> (Self, QueueConsumer<NoteEvent>) {
        let (producer, consumer) = queue::bounded("notes", capacity);
        (Self::new(producer), consumer)
    }

    pub fn enqueue(&mut self, event: NoteEvent) -> PushOutcome {
        self.queue.try_push(event.sanitized())
    }

    /// Note-on now, note-off scheduled in the voice slot
    pub fn trigger(&mut self, trigger: NoteTrigger, now_ms: u64) {
        let on = NoteEvent::note_on(trigger.channel, trigger.note, trigger.velocity, trigger.length_ms)
            .sanitized();
        let off = PendingNoteOff {
            note: on.note,
            channel: on.channel,
            velocity: on.velocity,
            due_ms: now_ms + on.length_ms as u64,
        };

        // A retrigger closes the voice's previous note first
        if let Some(previous) = self.pending.replace(trigger.voice, off) {
            self.queue.try_push(previous.to_event());
        }
        self.enqueue(on);
    }

    /// Enqueue note-offs that are due; returns how many were queued.
    /// A note-off the full queue rejects stays due for the next call.
    pub fn update(&mut self, now_ms: u64) -> usize {
        let queue = &mut self.queue;
        let mut count = 0;
        self.pending.take_due(now_ms, |off| {
            let queued = queue.try_push(off.to_event()).is_queued();
            count += queued as usize;
            queued
        });
        count
    }

    /// Enqueue every pending note-off immediately; rejected ones stay pending
    pub fn flush_all(&mut self) -> usize {
        let queue = &mut self.queue;
        let mut count = 0;
        self.pending.take_all(|off| {
            let queued = queue.try_push(off.to_event()).is_queued();
            count += queued as usize;
            queued
        });
        count
    }

    pub fn pending(&self) -> &NoteOffTable {
        &self.pending
    }

    pub fn dropped(&self) -> u32 {
        self.queue.dropped()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// Write every queued event to the note outputs; returns how many
pub fn drain_notes(
    queue: &mut QueueConsumer<NoteEvent>,
    sink: &dyn OutputSink,
    outputs: &SharedOutputs,
) -> usize {
    let mut sent = 0;
    while let Some(event) = queue.try_pop() {
        write_to_set(sink, outputs.get(), &event.to_bytes());
        sent += 1;
    }
    sent
}

/// Dedicated thread draining the note queue
pub struct NoteWorker {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl NoteWorker {
    const WAIT_TIMEOUT: Duration = Duration::from_millis(200);

    pub fn spawn(
        mut queue: QueueConsumer<NoteEvent>,
        sink: Arc<dyn OutputSink>,
        outputs: Arc<SharedOutputs>,
    ) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = thread::Builder::new()
            .name("note-dispatch".into())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    queue.wait(Self::WAIT_TIMEOUT);
                    drain_notes(&mut queue, sink.as_ref(), &outputs);
                }
                drain_notes(&mut queue, sink.as_ref(), &outputs);
                debug!("note worker stopped");
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Stop after one last drain
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NoteWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Integration test: note and feedback paths end to end
//
// Dispatchers on the producer side, worker threads on the consumer side,
// bytes captured at the sink.

mod common;

use common::CaptureSink;
use euclidio::dispatch::{
    FeedbackDispatcher, FeedbackWorker, NoteDispatcher, NoteEvent, NoteWorker, OscOutput, Param,
    PushOutcome, SharedOutputs, bounded,
};
use euclidio::midi::{OutputPort, OutputSet};
use euclidio::sequencer::{NoteTrigger, TrackId, VoiceKey};
use rosc::{OscMessage, OscType};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CaptureOsc {
    sent: Mutex<Vec<OscMessage>>,
}

impl OscOutput for CaptureOsc {
    fn broadcast(&self, message: &OscMessage) {
        self.sent.lock().unwrap().push(message.clone());
    }
}

fn kick(track: i32, note: u8) -> NoteTrigger {
    NoteTrigger {
        voice: VoiceKey::rhythmic(TrackId::clamped(track)),
        channel: 1,
        note,
        velocity: 100,
        length_ms: 100,
    }
}

#[test]
fn test_note_on_then_off_reach_selected_outputs() {
    let sink = CaptureSink::new();
    let outputs = Arc::new(SharedOutputs::new(OutputSet::USB));
    let (mut notes, queue) = NoteDispatcher::with_capacity(16);
    let mut worker = NoteWorker::spawn(queue, sink.clone(), outputs).unwrap();

    notes.trigger(kick(0, 36), 0);
    assert_eq!(notes.update(99), 0);
    assert_eq!(notes.update(100), 1);
    worker.shutdown();

    assert_eq!(sink.bytes_for(OutputPort::Usb), vec![0x91, 36, 100, 0x81, 36, 100]);
    assert!(sink.bytes_for(OutputPort::Din1).is_empty());
}

#[test]
fn test_retrigger_closes_previous_note_first() {
    let sink = CaptureSink::new();
    let outputs = Arc::new(SharedOutputs::new(OutputSet::USB));
    let (mut notes, queue) = NoteDispatcher::with_capacity(16);
    let mut worker = NoteWorker::spawn(queue, sink.clone(), outputs).unwrap();

    notes.trigger(kick(2, 40), 0);
    notes.trigger(kick(2, 41), 50);
    worker.shutdown();

    assert_eq!(
        sink.bytes_for(OutputPort::Usb),
        vec![0x91, 40, 100, 0x81, 40, 100, 0x91, 41, 100]
    );
    assert_eq!(notes.pending().live_count(), 1);
}

#[test]
fn test_flush_releases_every_sounding_note() {
    let sink = CaptureSink::new();
    let outputs = Arc::new(SharedOutputs::new(OutputSet::USB));
    let (mut notes, queue) = NoteDispatcher::with_capacity(32);
    let mut worker = NoteWorker::spawn(queue, sink.clone(), outputs).unwrap();

    for track in 0..4 {
        notes.trigger(kick(track, 36 + track as u8), 0);
    }
    assert_eq!(notes.flush_all(), 4);
    assert_eq!(notes.pending().live_count(), 0);
    worker.shutdown();

    let offs = sink
        .take()
        .into_iter()
        .filter(|(_, bytes)| bytes[0] == 0x81)
        .count();
    assert_eq!(offs, 4);
}

#[test]
fn test_output_selection_changes_take_effect_live() {
    let sink = CaptureSink::new();
    let outputs = Arc::new(SharedOutputs::new(OutputSet::NONE));
    let (mut notes, queue) = NoteDispatcher::with_capacity(16);
    let mut worker = NoteWorker::spawn(queue, sink.clone(), outputs.clone()).unwrap();

    outputs.set(OutputSet::ALL);
    notes.trigger(kick(0, 36), 0);
    worker.shutdown();

    for port in [OutputPort::Din1, OutputPort::Din2, OutputPort::Din3, OutputPort::Usb] {
        assert_eq!(sink.bytes_for(port), vec![0x91, 36, 100]);
    }
}

#[test]
fn test_feedback_goes_to_midi_and_osc() {
    let sink = CaptureSink::new();
    let osc = Arc::new(CaptureOsc::default());
    let outputs = Arc::new(SharedOutputs::new(OutputSet::USB));
    let (mut feedback, queue) = FeedbackDispatcher::with_capacity(64);
    let mut worker = FeedbackWorker::spawn(
        queue,
        sink.clone(),
        outputs,
        Some(osc.clone() as Arc<dyn OscOutput>),
    )
    .unwrap();

    assert!(feedback.send_if_changed(Param::Velocity, 80));
    assert!(!feedback.send_if_changed(Param::Velocity, 80));
    worker.shutdown();

    assert_eq!(sink.bytes_for(OutputPort::Usb), vec![0xB9, 19, 80]);
    let sent = osc.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].addr, "/sequencer/velocity");
    assert_eq!(sent[0].args, vec![OscType::Int(80)]);
}

#[test]
fn test_feedback_without_osc_output_still_drains() {
    let sink = CaptureSink::new();
    let outputs = Arc::new(SharedOutputs::new(OutputSet::USB));
    let (mut feedback, queue) = FeedbackDispatcher::with_capacity(64);
    let mut worker = FeedbackWorker::spawn(queue, sink.clone(), outputs, None).unwrap();

    feedback.send_forced(Param::PlayState, 1);
    worker.shutdown();

    assert_eq!(sink.bytes_for(OutputPort::Usb), vec![0x99, 0, 127]);
}

#[test]
fn test_full_queue_counts_drops() {
    let (mut notes, _queue) = NoteDispatcher::with_capacity(2);
    for note in 0..5 {
        notes.trigger(kick(note, 60 + note as u8), 0);
    }
    assert_eq!(notes.queued(), 2);
    assert_eq!(notes.dropped(), 3);
}

#[test]
fn test_queue_keeps_capacity_and_counts_the_rest() {
    let (mut producer, mut consumer) = bounded::<NoteEvent>("test", 8);
    let outcomes: Vec<PushOutcome> = (0..11)
        .map(|note| producer.try_push(NoteEvent::note_on(0, note, 100, 100)))
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.is_queued()).count(), 8);
    assert_eq!(producer.dropped(), 3);
    let delivered: Vec<u8> = std::iter::from_fn(|| consumer.try_pop()).map(|e| e.note).collect();
    // Oldest events survive, the newest are dropped
    assert_eq!(delivered, (0..8).collect::<Vec<u8>>());
}

#[test]
fn test_forced_send_ignores_and_refreshes_cache() {
    let (mut feedback, mut queue) = FeedbackDispatcher::with_capacity(64);
    feedback.set_osc_enabled(false);

    assert!(feedback.send_if_changed(Param::Steps, 16));
    assert!(!feedback.send_if_changed(Param::Steps, 16));
    feedback.send_all_forced([(Param::Steps, 16), (Param::Hits, 4)]);

    assert_eq!(std::iter::from_fn(|| queue.try_pop()).count(), 3);
    assert_eq!(feedback.cache().get(Param::Hits), Some(4));
    assert!(!feedback.send_if_changed(Param::Hits, 4));

    feedback.reset_cache();
    assert!(feedback.send_if_changed(Param::Hits, 4));
}

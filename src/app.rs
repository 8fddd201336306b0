// Application context - engine core, clock listener and worker bring-up

use crate::clock::{Clock, ClockListener, ClockWorker, MasterTimer, TickInfo};
use crate::config::AppConfig;
use crate::control::{self, Applied, Command, EngineState};
use crate::dispatch::{
    FEEDBACK_QUEUE_CAPACITY, FeedbackDispatcher, FeedbackWorker, NOTE_QUEUE_CAPACITY,
    NoteDispatcher, NoteWorker, OscOutput,
};
use crate::midi::event::realtime;
use crate::midi::{
    InputPort, MessageHandler, MidiPorts, MidiRouter, OutputSink, RawMessage, RoutingMatrix,
    SharedOutputs, send_clock_realtime,
};
use crate::osc::{OscError, OscServer};
use crate::preset::{Preset, PresetError, PresetOutputs, PresetStore};
use rosc::OscMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Main loop sleep between polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

const PEER_EXPIRY_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Worker thread error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Osc(#[from] OscError),

    #[error(transparent)]
    Preset(#[from] PresetError),
}

/// Engine state plus the producer halves of the output queues. One lock
/// guards it; the clock worker and the main loop take turns.
pub struct Core {
    pub state: EngineState,
    pub notes: NoteDispatcher,
    pub feedback: FeedbackDispatcher,
    clock: Arc<Clock>,
    force_all: bool,
    force_harmonic: bool,
}

impl Core {
    pub fn new(
        clock: Arc<Clock>,
        state: EngineState,
        notes: NoteDispatcher,
        feedback: FeedbackDispatcher,
    ) -> Self {
        Self {
            state,
            notes,
            feedback,
            clock,
            // First sync sends a full snapshot
            force_all: true,
            force_harmonic: false,
        }
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.uptime().millis()
    }

    pub fn apply(&mut self, command: Command) -> Applied {
        let applied = self.state.apply(&self.clock, command);
        if applied.force_harmonic {
            self.force_harmonic = true;
        }
        applied
    }

    pub fn handle_osc(&mut self, message: &OscMessage) -> Option<Applied> {
        match control::osc::translate(&message.addr, &message.args) {
            Some(command) => Some(self.apply(command)),
            None => {
                debug!(addr = %message.addr, "unmapped OSC message");
                None
            }
        }
    }

    /// Request a full resend on the next update
    pub fn force_feedback(&mut self) {
        self.force_all = true;
    }

    pub fn on_tick(&mut self, tick: u32) {
        let now = self.now_ms();
        let notes = &mut self.notes;
        self.state.rhythmic.on_tick(tick, |trigger| notes.trigger(trigger, now));
        self.state.harmonic.on_tick(tick, |trigger| notes.trigger(trigger, now));
    }

    pub fn on_start(&mut self) {
        self.state.rhythmic.start();
        self.state.harmonic.reset();
    }

    pub fn on_stop(&mut self) {
        self.state.rhythmic.stop();
        self.state.harmonic.reset();
    }

    /// Housekeeping for one main-loop pass: note-offs, debounced patterns, feedback
    pub fn update(&mut self) {
        let now = self.now_ms();
        self.notes.update(now);
        self.state.rhythmic.update(now);
        self.state.harmonic.update(now);
        if self.state.harmonic.take_pending_feedback() {
            self.force_harmonic = true;
        }
        self.flush_feedback();
    }

    pub fn flush_feedback(&mut self) -> usize {
        let clock = self.clock.as_ref();
        if self.force_all {
            self.force_all = false;
            self.force_harmonic = false;
            return self.feedback.send_all_forced(self.state.feedback_values(clock));
        }

        let mut sent = 0;
        if self.force_harmonic {
            self.force_harmonic = false;
            sent += self
                .feedback
                .send_all_forced(self.state.harmonic_feedback_values(clock));
        }
        sent + self.feedback.sync(self.state.feedback_values(clock))
    }

    pub fn save_preset(
        &self,
        store: &PresetStore,
        slot: u8,
        name: &str,
        outputs: PresetOutputs,
    ) -> Result<(), PresetError> {
        let preset = Preset::capture(name, &self.state, outputs);
        store.save(slot, &preset)?;
        Ok(())
    }

    pub fn load_preset(&mut self, store: &PresetStore, slot: u8) -> Result<PresetOutputs, PresetError> {
        let preset = store.load(slot)?;
        let outputs = preset.apply(&mut self.state);
        self.force_all = true;
        info!(slot, name = %preset.name, "preset applied");
        Ok(outputs)
    }
}

impl MessageHandler for Core {
    fn routing(&self) -> &RoutingMatrix {
        &self.state.routing
    }

    fn handle_message(&mut self, _input: InputPort, message: &RawMessage) {
        let command = message.event().and_then(|event| control::cc::translate(&event));
        if let Some(command) = command {
            self.apply(command);
        }
    }
}

/// Clock listener: echoes real-time bytes and runs the engines per tick
pub struct CoreListener {
    core: Arc<Mutex<Core>>,
    clock: Arc<Clock>,
    sink: Arc<dyn OutputSink>,
    clock_outputs: Arc<SharedOutputs>,
}

impl CoreListener {
    pub fn new(
        core: Arc<Mutex<Core>>,
        clock: Arc<Clock>,
        sink: Arc<dyn OutputSink>,
        clock_outputs: Arc<SharedOutputs>,
    ) -> Self {
        Self {
            core,
            clock,
            sink,
            clock_outputs,
        }
    }

    fn send(&self, byte: u8) {
        send_clock_realtime(self.sink.as_ref(), &self.clock, &self.clock_outputs, byte);
    }
}

impl ClockListener for CoreListener {
    fn on_tick(&mut self, tick: TickInfo) {
        self.send(realtime::CLOCK);
        if let Ok(mut core) = self.core.lock() {
            core.on_tick(tick.tick);
        }
    }

    fn on_start(&mut self) {
        self.send(realtime::START);
        if let Ok(mut core) = self.core.lock() {
            core.on_start();
        }
    }

    fn on_stop(&mut self) {
        self.send(realtime::STOP);
        if let Ok(mut core) = self.core.lock() {
            core.on_stop();
        }
    }

    fn on_continue(&mut self) {
        self.send(realtime::CONTINUE);
    }
}

/// Output selections changed at run time
#[derive(Clone)]
pub struct OutputSelections {
    pub notes: Arc<SharedOutputs>,
    pub clock: Arc<SharedOutputs>,
    pub feedback: Arc<SharedOutputs>,
}

impl OutputSelections {
    pub fn snapshot(&self) -> PresetOutputs {
        PresetOutputs {
            notes: self.notes.get(),
            clock: self.clock.get(),
            feedback: self.feedback.get(),
        }
    }

    pub fn apply(&self, outputs: PresetOutputs) {
        self.notes.set(outputs.notes);
        self.clock.set(outputs.clock);
        self.feedback.set(outputs.feedback);
    }
}

/// The running instrument: host ports, OSC socket, core and workers
pub struct App {
    clock: Arc<Clock>,
    core: Arc<Mutex<Core>>,
    router: MidiRouter,
    ports: MidiPorts,
    osc: Option<Arc<OscServer>>,
    outputs: OutputSelections,
    presets: PresetStore,
    last_peer_expiry: Instant,
    clock_worker: Option<ClockWorker>,
    timer: Option<MasterTimer>,
    note_worker: Option<NoteWorker>,
    feedback_worker: Option<FeedbackWorker>,
}

impl App {
    pub fn start(config: &AppConfig) -> Result<Self, AppError> {
        let clock = Clock::new(config.bpm);
        clock.set_sync_mode(config.sync_mode);
        clock.set_clock_io(config.clock_io);

        let ports = MidiPorts::open(&config.ports);
        let sink: Arc<dyn OutputSink> = ports.sink();

        let outputs = OutputSelections {
            notes: Arc::new(SharedOutputs::new(config.note_outputs)),
            clock: Arc::new(SharedOutputs::new(config.clock_outputs)),
            feedback: Arc::new(SharedOutputs::new(config.feedback_outputs)),
        };

        let osc = match config.osc_port {
            0 => None,
            port => Some(Arc::new(OscServer::bind(
                port,
                config.osc_max_peers,
                config.peer_timeout(),
            )?)),
        };

        let (notes, note_queue) = NoteDispatcher::with_capacity(NOTE_QUEUE_CAPACITY);
        let (mut feedback, feedback_queue) = FeedbackDispatcher::with_capacity(FEEDBACK_QUEUE_CAPACITY);
        feedback.set_osc_enabled(osc.is_some());

        let mut state = EngineState::new();
        state.routing = config.routing();
        let core = Arc::new(Mutex::new(Core::new(clock.clone(), state, notes, feedback)));

        let note_worker = NoteWorker::spawn(note_queue, sink.clone(), outputs.notes.clone())?;
        let osc_output = osc.clone().map(|server| server as Arc<dyn OscOutput>);
        let feedback_worker =
            FeedbackWorker::spawn(feedback_queue, sink.clone(), outputs.feedback.clone(), osc_output)?;
        let listener = CoreListener::new(core.clone(), clock.clone(), sink.clone(), outputs.clock.clone());
        let clock_worker = ClockWorker::spawn(clock.clone(), listener)?;
        let timer = MasterTimer::spawn(clock.clone())?;

        let router = MidiRouter::with_clock_outputs(clock.clone(), sink, outputs.clock.clone());
        clock.begin(config.bpm);

        info!(
            bpm = config.bpm,
            sync = ?config.sync_mode,
            osc = ?config.osc_port,
            "euclidio started"
        );

        Ok(Self {
            clock,
            core,
            router,
            ports,
            osc,
            outputs,
            presets: config.preset_store(),
            last_peer_expiry: Instant::now(),
            clock_worker: Some(clock_worker),
            timer: Some(timer),
            note_worker: Some(note_worker),
            feedback_worker: Some(feedback_worker),
        })
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    pub fn core(&self) -> &Arc<Mutex<Core>> {
        &self.core
    }

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    /// One main-loop pass; returns the number of inbound bytes and OSC messages handled
    pub fn poll(&mut self) -> usize {
        let now = Instant::now();
        let mut handled = 0;

        if let Ok(mut core) = self.core.lock() {
            let router = &mut self.router;
            handled += self
                .ports
                .drain_inbound(|input, byte| router.receive_byte(input, byte, &mut *core));

            if let Some(osc) = &self.osc {
                match osc.poll(now, |message| {
                    core.handle_osc(&message);
                }) {
                    Ok(count) => handled += count,
                    Err(e) => warn!(error = %e, "OSC receive failed"),
                }
            }

            core.update();
        }

        self.ports.maintain(now);
        if now.duration_since(self.last_peer_expiry) >= PEER_EXPIRY_INTERVAL {
            self.last_peer_expiry = now;
            if let Some(osc) = &self.osc {
                let expired = osc.expire_peers(now);
                if expired > 0 {
                    debug!(expired, "OSC peers expired");
                }
            }
        }
        handled
    }

    /// Poll until `stop` is raised or `deadline` passes
    pub fn run(&mut self, stop: &AtomicBool, deadline: Option<Instant>) {
        while !stop.load(Ordering::Acquire) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            if self.poll() == 0 {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    pub fn save_preset(&self, slot: u8, name: &str) -> Result<(), AppError> {
        if let Ok(core) = self.core.lock() {
            core.save_preset(&self.presets, slot, name, self.outputs.snapshot())?;
        }
        Ok(())
    }

    pub fn load_preset(&mut self, slot: u8) -> Result<(), AppError> {
        if let Ok(mut core) = self.core.lock() {
            let outputs = core.load_preset(&self.presets, slot)?;
            self.outputs.apply(outputs);
        }
        Ok(())
    }

    /// Stop the transport, release every sounding note and join the workers
    pub fn shutdown(&mut self) {
        self.clock.stop();
        if let Some(mut timer) = self.timer.take() {
            timer.shutdown();
        }
        if let Some(mut worker) = self.clock_worker.take() {
            worker.shutdown();
        }
        if let Ok(mut core) = self.core.lock() {
            let flushed = core.notes.flush_all();
            debug!(flushed, "pending note-offs flushed");
            let stuck = core.notes.pending().live_count();
            if stuck > 0 {
                warn!(stuck, "note queue full at shutdown, note-offs not sent");
            }
        }
        if let Some(mut worker) = self.note_worker.take() {
            worker.shutdown();
        }
        if let Some(mut worker) = self.feedback_worker.take() {
            worker.shutdown();
        }
        self.ports.close();
        info!("euclidio stopped");
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if self.note_worker.is_some() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockDriver;
    use crate::dispatch::{FeedbackMessage, NoteEvent, QueueConsumer};
    use crate::midi::{CaptureSink, OutputPort, OutputSet};
    use crate::sequencer::TrackId;

    struct Harness {
        core: Arc<Mutex<Core>>,
        clock: Arc<Clock>,
        notes: QueueConsumer<NoteEvent>,
        feedback: QueueConsumer<FeedbackMessage>,
    }

    fn harness() -> Harness {
        let clock = Clock::new(120.0);
        let (notes, note_rx) = NoteDispatcher::with_capacity(64);
        let (mut feedback, feedback_rx) = FeedbackDispatcher::with_capacity(256);
        feedback.set_osc_enabled(false);
        let core = Core::new(clock.clone(), EngineState::new(), notes, feedback);
        Harness {
            core: Arc::new(Mutex::new(core)),
            clock,
            notes: note_rx,
            feedback: feedback_rx,
        }
    }

    fn drain<T>(queue: &mut QueueConsumer<T>) -> Vec<T> {
        std::iter::from_fn(|| queue.try_pop()).collect()
    }

    #[test]
    fn test_first_update_sends_full_snapshot() {
        let mut h = harness();
        let mut core = h.core.lock().unwrap();
        core.update();
        let first = drain(&mut h.feedback).len();
        assert!(first > 40);

        core.update();
        assert!(drain(&mut h.feedback).is_empty());

        core.apply(Command::Velocity(12));
        core.update();
        assert_eq!(
            drain(&mut h.feedback),
            vec![FeedbackMessage::Midi([0xB9, 19, 12])]
        );
    }

    #[test]
    fn test_control_channel_cc_reaches_engine() {
        let h = harness();
        let sink = CaptureSink::new();
        let mut router = MidiRouter::new(h.clock.clone(), sink.clone());
        let mut core = h.core.lock().unwrap();
        core.state.routing.set(InputPort::Din1, OutputPort::Usb, true);

        router.receive_bytes(InputPort::Din1, &[0xB9, 20, 127], &mut *core);
        assert_eq!(core.state.rhythmic.selected_config().steps(), 32);
        // Mapped messages still follow the routing matrix
        assert_eq!(sink.bytes_for(OutputPort::Usb), vec![0xB9, 20, 127]);
    }

    #[test]
    fn test_harmonic_toggle_forces_harmonic_resend() {
        let mut h = harness();
        let mut core = h.core.lock().unwrap();
        core.update();
        drain(&mut h.feedback);

        core.apply(Command::HarmonicToggleActive);
        core.update();
        let sent = drain(&mut h.feedback);
        // Every harmonic MIDI encoding goes out again, not just the changed flag
        assert!(sent.len() >= 20);
        assert!(sent.contains(&FeedbackMessage::Midi([0x99, 90, 127])));
    }

    #[test]
    fn test_listener_plays_enabled_track() {
        let mut h = harness();
        let sink = CaptureSink::new();
        let clock_outputs = Arc::new(SharedOutputs::new(OutputSet::USB));
        let mut listener =
            CoreListener::new(h.core.clone(), h.clock.clone(), sink.clone(), clock_outputs);

        {
            let mut core = h.core.lock().unwrap();
            core.state.rhythmic.set_track_enabled(TrackId::clamped(0), true);
        }

        let mut driver = ClockDriver::new(h.clock.clone());
        h.clock.start();
        h.clock.timer_tick();
        driver.process_pending(&mut listener);

        assert_eq!(sink.bytes_for(OutputPort::Usb), vec![0xFA, 0xF8]);
        let notes = drain(&mut h.notes);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].on);
        assert_eq!(notes[0].note, 36);
    }

    #[test]
    fn test_osc_message_applies() {
        let h = harness();
        let mut core = h.core.lock().unwrap();
        let message = OscMessage {
            addr: "/sequencer/hits".into(),
            args: vec![rosc::OscType::Float(7.0)],
        };
        assert!(core.handle_osc(&message).is_some());
        assert_eq!(core.state.rhythmic.selected_config().hits(), 7);
        let unknown = OscMessage {
            addr: "/sequencer/unknown".into(),
            args: vec![],
        };
        assert!(core.handle_osc(&unknown).is_none());
    }

    #[test]
    fn test_preset_round_trip_through_core() {
        let h = harness();
        let dir = tempfile::TempDir::new().unwrap();
        let store = PresetStore::new(dir.path());
        let mut core = h.core.lock().unwrap();

        core.apply(Command::Steps(5));
        core.save_preset(&store, 4, "five", PresetOutputs::default()).unwrap();
        core.apply(Command::Steps(9));
        core.load_preset(&store, 4).unwrap();
        assert_eq!(core.state.rhythmic.selected_config().steps(), 5);
    }
}

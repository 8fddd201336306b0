// MIDI router - per-input reassembly, clock interception, mapping and forwarding

use super::event::realtime;
use super::parser::{ParseOutcome, RawMessage, StreamParser};
use super::routing::{INPUT_COUNT, InputPort, OutputPort, OutputSet, RoutingMatrix, SharedOutputs};
use crate::clock::Clock;
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

/// Byte writer for the physical outputs
pub trait OutputSink: Send + Sync {
    fn write(&self, port: OutputPort, bytes: &[u8]);
}

/// Write the same bytes to every port of a set
pub fn write_to_set(sink: &dyn OutputSink, set: OutputSet, bytes: &[u8]) {
    for port in set.iter() {
        sink.write(port, bytes);
    }
}

/// Real-time byte to the clock outputs: the shared selection narrowed by the clock I/O mask
pub fn send_clock_realtime(sink: &dyn OutputSink, clock: &Clock, outputs: &SharedOutputs, byte: u8) {
    let set = outputs.get().intersection(clock.clock_io().outputs());
    write_to_set(sink, set, &[byte]);
}

/// Receives every complete message before it is forwarded
pub trait MessageHandler {
    fn routing(&self) -> &RoutingMatrix;
    fn handle_message(&mut self, input: InputPort, message: &RawMessage);
}

/// Sink that keeps everything written to it
#[cfg(test)]
#[derive(Default)]
pub struct CaptureSink {
    written: Mutex<Vec<(OutputPort, Vec<u8>)>>,
}

#[cfg(test)]
impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<(OutputPort, Vec<u8>)> {
        match self.written.lock() {
            Ok(mut written) => std::mem::take(&mut *written),
            Err(_) => Vec::new(),
        }
    }

    /// Bytes written to one port, concatenated
    pub fn bytes_for(&self, port: OutputPort) -> Vec<u8> {
        match self.written.lock() {
            Ok(written) => written
                .iter()
                .filter(|(p, _)| *p == port)
                .flat_map(|(_, bytes)| bytes.iter().copied())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn write_count(&self) -> usize {
        self.written.lock().map(|w| w.len()).unwrap_or(0)
    }
}

#[cfg(test)]
impl OutputSink for CaptureSink {
    fn write(&self, port: OutputPort, bytes: &[u8]) {
        if let Ok(mut written) = self.written.lock() {
            written.push((port, bytes.to_vec()));
        }
    }
}

pub struct MidiRouter {
    parsers: [StreamParser; INPUT_COUNT],
    clock: Arc<Clock>,
    sink: Arc<dyn OutputSink>,
    clock_outputs: Arc<SharedOutputs>,
}

impl MidiRouter {
    pub fn new(clock: Arc<Clock>, sink: Arc<dyn OutputSink>) -> Self {
        Self::with_clock_outputs(clock, sink, Arc::new(SharedOutputs::default()))
    }

    pub fn with_clock_outputs(
        clock: Arc<Clock>,
        sink: Arc<dyn OutputSink>,
        clock_outputs: Arc<SharedOutputs>,
    ) -> Self {
        Self {
            parsers: Default::default(),
            clock,
            sink,
            clock_outputs,
        }
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    pub fn parser(&self, input: InputPort) -> &StreamParser {
        &self.parsers[input.index()]
    }

    pub fn receive_bytes<H: MessageHandler + ?Sized>(
        &mut self,
        input: InputPort,
        bytes: &[u8],
        handler: &mut H,
    ) {
        for byte in bytes {
            self.receive_byte(input, *byte, handler);
        }
    }

    pub fn receive_byte<H: MessageHandler + ?Sized>(
        &mut self,
        input: InputPort,
        byte: u8,
        handler: &mut H,
    ) {
        match self.parsers[input.index()].push(byte) {
            ParseOutcome::Pending => {}
            ParseOutcome::Realtime(byte) => self.route_realtime(input, byte, handler.routing()),
            ParseOutcome::Message(message) => {
                // Mapping sees the message before it goes downstream
                handler.handle_message(input, &message);
                for output in handler.routing().outputs_for(input) {
                    self.sink.write(output, message.as_bytes());
                }
            }
        }
    }

    fn route_realtime(&self, input: InputPort, byte: u8, routing: &RoutingMatrix) {
        if realtime::is_transport(byte) {
            if self.clock.is_slave() && self.clock.is_clock_source_enabled(input) {
                match byte {
                    realtime::CLOCK => self.clock.receive_external_tick(),
                    realtime::START => self.clock.start(),
                    realtime::STOP => self.clock.stop(),
                    realtime::CONTINUE => self.clock.resume(),
                    _ => {}
                }
            }
            return;
        }

        for output in routing.outputs_for(input) {
            self.sink.write(output, &[byte]);
        }
    }

    pub fn send_realtime_to_clock_outputs(&self, byte: u8) {
        send_clock_realtime(self.sink.as_ref(), &self.clock, &self.clock_outputs, byte);
    }
}

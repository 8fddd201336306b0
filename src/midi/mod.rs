// MIDI module - wire messages, stream parsing, routing and host ports

pub mod event;
pub mod parser;
pub mod ports;
pub mod router;
pub mod routing;

pub use event::MidiEvent;
pub use parser::{ParseOutcome, RawMessage, StreamParser};
pub use ports::{MidiPortSink, MidiPorts, PortBindings, PortError};
#[cfg(test)]
pub use router::CaptureSink;
pub use router::{MessageHandler, MidiRouter, OutputSink, send_clock_realtime, write_to_set};
pub use routing::{ClockIo, InputPort, OutputPort, OutputSet, RoutingMatrix, SharedOutputs};

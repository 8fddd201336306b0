// MIDI ports - binds host MIDI ports (midir) to the physical port model
// Inbound bytes go through a ring buffer per input; the main loop feeds them to the router

use super::router::OutputSink;
use super::routing::{InputPort, OUTPUT_COUNT, OutputPort};
use crate::connection::{PortStatus, PortStatusBoard, ReconnectionStrategy};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Producer, Split};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

const CLIENT_NAME: &str = "euclidio";
const INBOUND_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("MIDI init error: {0}")]
    Init(String),

    #[error("No host MIDI port matches '{0}'")]
    NotFound(String),

    #[error("Failed to connect to '{name}': {reason}")]
    Connect { name: String, reason: String },
}

/// Host port name patterns for each physical port (case-insensitive substring)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortBindings {
    pub inputs: Vec<(InputPort, String)>,
    pub outputs: Vec<(OutputPort, String)>,
}

impl PortBindings {
    pub fn input(&self, port: InputPort) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, name)| name.as_str())
    }

    pub fn output(&self, port: OutputPort) -> Option<&str> {
        self.outputs
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, name)| name.as_str())
    }
}

pub fn matches_pattern(host_name: &str, pattern: &str) -> bool {
    !pattern.is_empty() && host_name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Names of every host input port
pub fn list_input_ports() -> Result<Vec<String>, PortError> {
    let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| PortError::Init(e.to_string()))?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect())
}

/// Names of every host output port
pub fn list_output_ports() -> Result<Vec<String>, PortError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| PortError::Init(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

type InboundProducer = Arc<Mutex<ringbuf::HeapProd<u8>>>;

fn connect_input(
    port: InputPort,
    pattern: &str,
    producer: InboundProducer,
) -> Result<(MidiInputConnection<()>, String), PortError> {
    let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| PortError::Init(e.to_string()))?;
    // Clock and active sensing bytes are needed
    midi_in.ignore(Ignore::None);

    let host_port = midi_in
        .ports()
        .into_iter()
        .find(|p| {
            midi_in
                .port_name(p)
                .map(|name| matches_pattern(&name, pattern))
                .unwrap_or(false)
        })
        .ok_or_else(|| PortError::NotFound(pattern.to_string()))?;
    let name = midi_in
        .port_name(&host_port)
        .unwrap_or_else(|_| pattern.to_string());

    let connection = midi_in
        .connect(
            &host_port,
            &format!("{}-{}", CLIENT_NAME, port),
            move |_timestamp, message, _| {
                if let Ok(mut tx) = producer.lock() {
                    for byte in message {
                        if tx.try_push(*byte).is_err() {
                            break;
                        }
                    }
                }
            },
            (),
        )
        .map_err(|e| PortError::Connect {
            name: name.clone(),
            reason: e.to_string(),
        })?;

    Ok((connection, name))
}

fn connect_output(port: OutputPort, pattern: &str) -> Result<(MidiOutputConnection, String), PortError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| PortError::Init(e.to_string()))?;

    let host_port = midi_out
        .ports()
        .into_iter()
        .find(|p| {
            midi_out
                .port_name(p)
                .map(|name| matches_pattern(&name, pattern))
                .unwrap_or(false)
        })
        .ok_or_else(|| PortError::NotFound(pattern.to_string()))?;
    let name = midi_out
        .port_name(&host_port)
        .unwrap_or_else(|_| pattern.to_string());

    let connection = midi_out
        .connect(&host_port, &format!("{}-{}", CLIENT_NAME, port))
        .map_err(|e| PortError::Connect {
            name: name.clone(),
            reason: e.to_string(),
        })?;

    Ok((connection, name))
}

struct InputLink {
    port: InputPort,
    pattern: Option<String>,
    connection: Option<MidiInputConnection<()>>,
    producer: InboundProducer,
    consumer: ringbuf::HeapCons<u8>,
    backoff: ReconnectionStrategy,
}

#[derive(Default)]
struct OutputLink {
    pattern: Option<String>,
    connection: Option<MidiOutputConnection>,
    backoff: ReconnectionStrategy,
}

/// Output side: one optional host connection per physical output
pub struct MidiPortSink {
    links: [Mutex<OutputLink>; OUTPUT_COUNT],
    status: Arc<PortStatusBoard>,
}

impl MidiPortSink {
    fn new(bindings: &PortBindings, status: Arc<PortStatusBoard>) -> Self {
        let links: [Mutex<OutputLink>; OUTPUT_COUNT] = Default::default();
        for port in OutputPort::ALL {
            if let Some(pattern) = bindings.output(port) {
                if let Ok(mut link) = links[port.index()].lock() {
                    link.pattern = Some(pattern.to_string());
                }
                status.set_output(port, PortStatus::Disconnected);
            }
        }
        Self { links, status }
    }

    /// Reopen bound outputs that are due for another attempt
    pub fn maintain(&self, now: Instant) {
        for port in OutputPort::ALL {
            if !self.status.output(port).needs_reopen() {
                continue;
            }
            let Ok(mut link) = self.links[port.index()].lock() else {
                continue;
            };
            let Some(pattern) = link.pattern.clone() else {
                continue;
            };
            if !link.backoff.is_due(now) {
                continue;
            }

            self.status.set_output(port, PortStatus::Connecting);
            match connect_output(port, &pattern) {
                Ok((connection, name)) => {
                    link.connection = Some(connection);
                    link.backoff.reset();
                    self.status.set_output(port, PortStatus::Connected);
                    info!(port = %port, host = %name, "MIDI output connected");
                }
                Err(e) => {
                    let delay = link.backoff.record_failure(now);
                    self.status.set_output(port, PortStatus::Disconnected);
                    debug!(port = %port, error = %e, retry_in = ?delay, "MIDI output unavailable");
                }
            }
        }
    }
}

impl OutputSink for MidiPortSink {
    fn write(&self, port: OutputPort, bytes: &[u8]) {
        let Ok(mut link) = self.links[port.index()].lock() else {
            return;
        };
        let Some(connection) = link.connection.as_mut() else {
            return;
        };
        if let Err(e) = connection.send(bytes) {
            warn!(port = %port, error = %e, "MIDI send failed, closing port");
            link.connection = None;
            self.status.set_output(port, PortStatus::Error);
        }
    }
}

/// Every host connection of the process
pub struct MidiPorts {
    inputs: Vec<InputLink>,
    sink: Arc<MidiPortSink>,
    status: Arc<PortStatusBoard>,
}

impl MidiPorts {
    /// Bind ports; missing host ports are retried later by `maintain`
    pub fn open(bindings: &PortBindings) -> Self {
        let status = PortStatusBoard::new();
        let sink = Arc::new(MidiPortSink::new(bindings, status.clone()));

        let inputs = InputPort::ALL
            .into_iter()
            .map(|port| {
                let (producer, consumer) = HeapRb::<u8>::new(INBOUND_CAPACITY).split();
                let pattern = bindings.input(port).map(str::to_string);
                if pattern.is_some() {
                    status.set_input(port, PortStatus::Disconnected);
                }
                InputLink {
                    port,
                    pattern,
                    connection: None,
                    producer: Arc::new(Mutex::new(producer)),
                    consumer,
                    backoff: ReconnectionStrategy::new(),
                }
            })
            .collect();

        let mut ports = Self {
            inputs,
            sink,
            status,
        };
        ports.maintain(Instant::now());
        ports
    }

    pub fn sink(&self) -> Arc<MidiPortSink> {
        self.sink.clone()
    }

    pub fn status(&self) -> Arc<PortStatusBoard> {
        self.status.clone()
    }

    pub fn maintain(&mut self, now: Instant) {
        for link in &mut self.inputs {
            if !self.status.input(link.port).needs_reopen() || !link.backoff.is_due(now) {
                continue;
            }
            let Some(pattern) = link.pattern.clone() else {
                continue;
            };

            self.status.set_input(link.port, PortStatus::Connecting);
            match connect_input(link.port, &pattern, link.producer.clone()) {
                Ok((connection, name)) => {
                    link.connection = Some(connection);
                    link.backoff.reset();
                    self.status.set_input(link.port, PortStatus::Connected);
                    info!(port = %link.port, host = %name, "MIDI input connected");
                }
                Err(e) => {
                    let delay = link.backoff.record_failure(now);
                    self.status.set_input(link.port, PortStatus::Disconnected);
                    debug!(port = %link.port, error = %e, retry_in = ?delay, "MIDI input unavailable");
                }
            }
        }
        self.sink.maintain(now);
    }

    /// Pop every received byte in arrival order per input
    pub fn drain_inbound(&mut self, mut on_byte: impl FnMut(InputPort, u8)) -> usize {
        let mut count = 0;
        for link in &mut self.inputs {
            while let Some(byte) = link.consumer.try_pop() {
                on_byte(link.port, byte);
                count += 1;
            }
        }
        count
    }

    pub fn close(&mut self) {
        for link in &mut self.inputs {
            if let Some(connection) = link.connection.take() {
                connection.close();
            }
        }
    }
}

impl Drop for MidiPorts {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("UM-ONE:UM-ONE MIDI 1 24:0", "um-one"));
        assert!(!matches_pattern("Launchpad", "um-one"));
        assert!(!matches_pattern("Anything", ""));
    }

    #[test]
    fn test_bindings_lookup() {
        let bindings = PortBindings {
            inputs: vec![(InputPort::Usb, "Keystep".to_string())],
            outputs: vec![(OutputPort::Din1, "UM-ONE".to_string())],
        };
        assert_eq!(bindings.input(InputPort::Usb), Some("Keystep"));
        assert_eq!(bindings.input(InputPort::Din1), None);
        assert_eq!(bindings.output(OutputPort::Din1), Some("UM-ONE"));
    }

    #[test]
    fn test_unbound_ports_stay_idle() {
        let mut ports = MidiPorts::open(&PortBindings::default());
        for port in InputPort::ALL {
            assert_eq!(ports.status().input(port), PortStatus::Unbound);
        }
        // Writing to an unbound output is a no-op
        ports.sink().write(OutputPort::Usb, &[0xF8]);
        assert_eq!(ports.drain_inbound(|_, _| {}), 0);
    }
}

// Port status - connection state of each host MIDI port, readable from any thread

use crate::midi::routing::{INPUT_COUNT, InputPort, OUTPUT_COUNT, OutputPort};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// No host port name configured for this physical port
    Unbound = 0,
    Disconnected = 1,
    Connecting = 2,
    Connected = 3,
    Error = 4,
}

impl From<u8> for PortStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => PortStatus::Disconnected,
            2 => PortStatus::Connecting,
            3 => PortStatus::Connected,
            4 => PortStatus::Error,
            _ => PortStatus::Unbound,
        }
    }
}

impl PortStatus {
    /// Bound but not usable, worth another open attempt
    pub fn needs_reopen(self) -> bool {
        matches!(self, PortStatus::Disconnected | PortStatus::Error)
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PortStatus::Unbound => "unbound",
            PortStatus::Disconnected => "disconnected",
            PortStatus::Connecting => "connecting",
            PortStatus::Connected => "connected",
            PortStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Status of every physical port, shared between the port bridge and observers
#[derive(Debug)]
pub struct PortStatusBoard {
    inputs: [AtomicU8; INPUT_COUNT],
    outputs: [AtomicU8; OUTPUT_COUNT],
}

impl PortStatusBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn input(&self, port: InputPort) -> PortStatus {
        PortStatus::from(self.inputs[port.index()].load(Ordering::Relaxed))
    }

    pub fn set_input(&self, port: InputPort, status: PortStatus) {
        self.inputs[port.index()].store(status as u8, Ordering::Relaxed);
    }

    pub fn output(&self, port: OutputPort) -> PortStatus {
        PortStatus::from(self.outputs[port.index()].load(Ordering::Relaxed))
    }

    pub fn set_output(&self, port: OutputPort, status: PortStatus) {
        self.outputs[port.index()].store(status as u8, Ordering::Relaxed);
    }

    pub fn connected_count(&self) -> usize {
        InputPort::ALL
            .iter()
            .filter(|p| self.input(**p) == PortStatus::Connected)
            .count()
            + OutputPort::ALL
                .iter()
                .filter(|p| self.output(**p) == PortStatus::Connected)
                .count()
    }
}

impl Default for PortStatusBoard {
    fn default() -> Self {
        Self {
            inputs: Default::default(),
            outputs: Default::default(),
        }
    }
}

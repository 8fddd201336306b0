// Routing - physical ports, routing matrix and output selections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Physical input streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputPort {
    Din1,
    Din2,
    Din3,
    Usb,
}

/// Physical output streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputPort {
    Din1,
    Din2,
    Din3,
    Usb,
}

pub const INPUT_COUNT: usize = 4;
pub const OUTPUT_COUNT: usize = 4;

impl InputPort {
    pub const ALL: [InputPort; INPUT_COUNT] =
        [InputPort::Din1, InputPort::Din2, InputPort::Din3, InputPort::Usb];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_serial(self) -> bool {
        !matches!(self, InputPort::Usb)
    }

    /// Name used in `/routing/<in>/<out>` paths
    pub fn path_name(self) -> &'static str {
        match self {
            InputPort::Din1 => "in1",
            InputPort::Din2 => "in2",
            InputPort::Din3 => "in3",
            InputPort::Usb => "usb",
        }
    }

    pub fn from_path_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.path_name() == name)
    }
}

impl OutputPort {
    pub const ALL: [OutputPort; OUTPUT_COUNT] = [
        OutputPort::Din1,
        OutputPort::Din2,
        OutputPort::Din3,
        OutputPort::Usb,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_serial(self) -> bool {
        !matches!(self, OutputPort::Usb)
    }

    pub fn path_name(self) -> &'static str {
        match self {
            OutputPort::Din1 => "out1",
            OutputPort::Din2 => "out2",
            OutputPort::Din3 => "out3",
            OutputPort::Usb => "usb",
        }
    }

    pub fn from_path_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.path_name() == name)
    }
}

impl fmt::Display for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_name())
    }
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_name())
    }
}

/// Boolean adjacency `route[input][output]`, empty by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutingMatrix {
    route: [[bool; OUTPUT_COUNT]; INPUT_COUNT],
}

impl RoutingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, input: InputPort, output: OutputPort) -> bool {
        self.route[input.index()][output.index()]
    }

    pub fn set(&mut self, input: InputPort, output: OutputPort, enabled: bool) {
        self.route[input.index()][output.index()] = enabled;
    }

    pub fn toggle(&mut self, input: InputPort, output: OutputPort) -> bool {
        let cell = &mut self.route[input.index()][output.index()];
        *cell = !*cell;
        *cell
    }

    pub fn clear_all(&mut self) {
        self.route = [[false; OUTPUT_COUNT]; INPUT_COUNT];
    }

    /// Outputs enabled for an input
    pub fn outputs_for(&self, input: InputPort) -> impl Iterator<Item = OutputPort> + '_ {
        OutputPort::ALL
            .into_iter()
            .filter(move |out| self.get(input, *out))
    }
}

/// A set of output ports, stored as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSet(u8);

impl OutputSet {
    pub const NONE: OutputSet = OutputSet(0);
    pub const ALL: OutputSet = OutputSet(0b1111);
    pub const SERIAL: OutputSet = OutputSet(0b0111);
    pub const USB: OutputSet = OutputSet(0b1000);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, port: OutputPort) -> bool {
        self.0 & (1 << port.index()) != 0
    }

    pub fn with(self, port: OutputPort) -> Self {
        Self(self.0 | (1 << port.index()))
    }

    pub fn without(self, port: OutputPort) -> Self {
        Self(self.0 & !(1 << port.index()))
    }

    pub fn intersection(self, other: OutputSet) -> Self {
        Self(self.0 & other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = OutputPort> {
        OutputPort::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl Default for OutputSet {
    fn default() -> Self {
        OutputSet::ALL
    }
}

/// Output set read by a worker and changed from control context
#[derive(Debug)]
pub struct SharedOutputs(AtomicU8);

impl SharedOutputs {
    pub fn new(set: OutputSet) -> Self {
        Self(AtomicU8::new(set.bits()))
    }

    pub fn get(&self) -> OutputSet {
        OutputSet::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, set: OutputSet) {
        self.0.store(set.bits(), Ordering::Relaxed);
    }
}

impl Default for SharedOutputs {
    fn default() -> Self {
        Self::new(OutputSet::ALL)
    }
}

/// Clock I/O selection: which inputs are accepted as clock sources
/// and which outputs receive real-time bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockIo(u8);

impl ClockIo {
    pub const USB: u8 = 0x01;
    pub const DIN: u8 = 0x04;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::USB | Self::DIN))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn usb(self) -> bool {
        self.0 & Self::USB != 0
    }

    pub fn din(self) -> bool {
        self.0 & Self::DIN != 0
    }

    pub fn accepts(self, input: InputPort) -> bool {
        if input.is_serial() { self.din() } else { self.usb() }
    }

    /// Output ports that carry clock bytes
    pub fn outputs(self) -> OutputSet {
        let mut set = OutputSet::NONE;
        if self.din() {
            set = OutputSet::from_bits(set.bits() | OutputSet::SERIAL.bits());
        }
        if self.usb() {
            set = set.with(OutputPort::Usb);
        }
        set
    }
}

impl Default for ClockIo {
    fn default() -> Self {
        ClockIo(Self::USB | Self::DIN)
    }
}

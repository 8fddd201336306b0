// MIDI event types and wire constants

/// Single-byte real-time messages
pub mod realtime {
    pub const CLOCK: u8 = 0xF8;
    pub const START: u8 = 0xFA;
    pub const CONTINUE: u8 = 0xFB;
    pub const STOP: u8 = 0xFC;
    pub const ACTIVE_SENSING: u8 = 0xFE;
    pub const RESET: u8 = 0xFF;

    pub fn is_realtime(byte: u8) -> bool {
        byte >= 0xF8
    }

    /// Clock, start, continue and stop drive the transport
    pub fn is_transport(byte: u8) -> bool {
        matches!(byte, CLOCK | START | CONTINUE | STOP)
    }
}

pub const SYSEX_START: u8 = 0xF0;

pub fn is_status(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Full length (status included) of a channel message, `None` for system bytes
pub fn channel_message_len(status: u8) -> Option<usize> {
    match status & 0xF0 {
        0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => Some(3),
        0xC0 | 0xD0 => Some(2),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
}

impl MidiEvent {
    /// Parse a raw channel message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }

        let status = bytes[0];
        let channel = status & 0x0F;
        let (data1, data2) = (bytes[1], bytes[2]);
        if is_status(data1) || is_status(data2) {
            return None;
        }

        match status & 0xF0 {
            0x90 => {
                // Velocity 0 = Note Off
                if data2 == 0 {
                    Some(MidiEvent::NoteOff { channel, note: data1, velocity: 0 })
                } else {
                    Some(MidiEvent::NoteOn { channel, note: data1, velocity: data2 })
                }
            }
            0x80 => Some(MidiEvent::NoteOff { channel, note: data1, velocity: data2 }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: data1,
                value: data2,
            }),
            0xE0 => {
                let value = ((data2 as i16) << 7) | data1 as i16;
                Some(MidiEvent::PitchBend { channel, value })
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. } => channel,
        }
    }

    /// Encode back to wire bytes, masking every field to its range
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiEvent::NoteOn { channel, note, velocity } => {
                [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiEvent::NoteOff { channel, note, velocity } => {
                [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiEvent::ControlChange { channel, controller, value } => {
                [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]
            }
            MidiEvent::PitchBend { channel, value } => {
                let value = value.clamp(0, 0x3FFF) as u16;
                [0xE0 | (channel & 0x0F), (value & 0x7F) as u8, (value >> 7) as u8]
            }
        }
    }
}

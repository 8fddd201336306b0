// Stream parser - rebuilds channel messages from one raw byte stream

use super::event::{MidiEvent, SYSEX_START, channel_message_len, is_status, realtime};

/// A complete channel message (2 or 3 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage {
    bytes: [u8; 3],
    len: u8,
}

impl RawMessage {
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if !(2..=3).contains(&bytes.len()) {
            return None;
        }
        let mut buf = [0u8; 3];
        buf[..bytes.len()].copy_from_slice(bytes);
        let msg = Self {
            bytes: buf,
            len: bytes.len() as u8,
        };
        msg.is_valid().then_some(msg)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    pub fn channel(&self) -> u8 {
        self.bytes[0] & 0x0F
    }

    /// Status byte set, every data byte with its high bit clear
    pub fn is_valid(&self) -> bool {
        is_status(self.bytes[0]) && self.as_bytes()[1..].iter().all(|b| !is_status(*b))
    }

    pub fn event(&self) -> Option<MidiEvent> {
        MidiEvent::from_bytes(self.as_bytes())
    }
}

/// Result of feeding one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Byte consumed, nothing complete yet (or byte dropped)
    Pending,
    /// Real-time byte, delivered immediately
    Realtime(u8),
    Message(RawMessage),
}

/// Per-input accumulation state.
///
/// Real-time bytes never touch the buffer. A new status byte discards any
/// incomplete message. Data bytes with no pending status are dropped.
/// Exclusive and system common messages are abandoned.
#[derive(Debug, Default)]
pub struct StreamParser {
    buffer: [u8; 3],
    len: usize,
    expected: usize,
    framing_errors: u32,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> ParseOutcome {
        if realtime::is_realtime(byte) {
            return ParseOutcome::Realtime(byte);
        }

        if is_status(byte) {
            if self.len > 0 {
                // Previous message never completed
                self.framing_error();
            }
            match channel_message_len(byte) {
                Some(expected) => {
                    self.buffer[0] = byte;
                    self.len = 1;
                    self.expected = expected;
                }
                None => {
                    // SysEx (0xF0) and system common: not supported, reset
                    if byte == SYSEX_START {
                        self.framing_error();
                    }
                    self.reset();
                }
            }
            return ParseOutcome::Pending;
        }

        if self.len == 0 {
            self.framing_error();
            return ParseOutcome::Pending;
        }

        self.buffer[self.len] = byte;
        self.len += 1;

        if self.len < self.expected {
            return ParseOutcome::Pending;
        }

        let complete = RawMessage::new(&self.buffer[..self.len]);
        self.reset();
        match complete {
            Some(msg) => ParseOutcome::Message(msg),
            None => {
                self.framing_error();
                ParseOutcome::Pending
            }
        }
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.expected = 0;
    }

    /// Bytes accumulated towards the current message
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn framing_errors(&self) -> u32 {
        self.framing_errors
    }

    fn framing_error(&mut self) {
        self.framing_errors = self.framing_errors.saturating_add(1);
    }
}

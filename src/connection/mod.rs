// Connection module - host MIDI port status and reopen backoff

pub mod reconnect;
pub mod status;

pub use reconnect::ReconnectionStrategy;
pub use status::{PortStatus, PortStatusBoard};

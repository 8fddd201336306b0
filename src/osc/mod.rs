// OSC module - UDP transport for control input and feedback output

pub mod peers;
pub mod server;

pub use peers::{DEFAULT_MAX_PEERS, DEFAULT_PEER_TIMEOUT, Peer, PeerRegistry};
pub use server::{OscError, OscServer, decode, encode, is_control_address};

/// Default listen port
pub const DEFAULT_OSC_PORT: u16 = 8000;

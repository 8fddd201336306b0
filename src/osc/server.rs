// OSC server - non-blocking UDP socket, packet decoding and peer broadcast

use super::peers::PeerRegistry;
use crate::dispatch::OscOutput;
use rosc::{OscMessage, OscPacket};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const RECV_BUFFER: usize = 1536;

/// Datagrams handled per poll before yielding back to the main loop
pub const MAX_PACKETS_PER_POLL: usize = 64;

/// Address prefixes handled locally; anything else is relayed between peers
const CONTROL_PREFIXES: [&str; 4] = ["/sequencer/", "/encoder/", "/routing/", "/harmonic"];

#[derive(Debug, Error)]
pub enum OscError {
    #[error("OSC socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OSC decode error: {0}")]
    Decode(String),

    #[error("OSC encode error: {0}")]
    Encode(String),
}

pub fn is_control_address(addr: &str) -> bool {
    CONTROL_PREFIXES.iter().any(|prefix| addr.starts_with(prefix))
}

/// Messages of a packet in order, bundles flattened
pub fn flatten_packet(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten_packet(inner, out);
            }
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<Vec<OscMessage>, OscError> {
    let (_, packet) =
        rosc::decoder::decode_udp(bytes).map_err(|e| OscError::Decode(format!("{e:?}")))?;
    let mut messages = Vec::new();
    flatten_packet(packet, &mut messages);
    Ok(messages)
}

pub fn encode(message: &OscMessage) -> Result<Vec<u8>, OscError> {
    rosc::encoder::encode(&OscPacket::Message(message.clone()))
        .map_err(|e| OscError::Encode(format!("{e:?}")))
}

pub struct OscServer {
    socket: UdpSocket,
    peers: Mutex<PeerRegistry>,
}

impl OscServer {
    pub fn bind(port: u16, max_peers: usize, peer_timeout: Duration) -> Result<Self, OscError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_nonblocking(true)?;
        info!(addr = ?socket.local_addr().ok(), "OSC listening");
        Ok(Self {
            socket,
            peers: Mutex::new(PeerRegistry::new(max_peers, peer_timeout)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, OscError> {
        Ok(self.socket.local_addr()?)
    }

    /// Read every waiting datagram. Control messages go to `on_message`;
    /// the rest are relayed to the other peers. Returns the number of
    /// control messages delivered.
    pub fn poll(
        &self,
        now: Instant,
        mut on_message: impl FnMut(OscMessage),
    ) -> Result<usize, OscError> {
        let mut buf = [0u8; RECV_BUFFER];
        let mut delivered = 0;

        for _ in 0..MAX_PACKETS_PER_POLL {
            let (size, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            };

            if let Ok(mut peers) = self.peers.lock() {
                if peers.touch(from, now) {
                    debug!(%from, "OSC peer registered");
                }
            }

            let messages = match decode(&buf[..size]) {
                Ok(messages) => messages,
                Err(e) => {
                    debug!(%from, error = %e, "dropping OSC packet");
                    continue;
                }
            };

            for message in messages {
                if is_control_address(&message.addr) {
                    on_message(message);
                    delivered += 1;
                } else {
                    self.send_to_peers(&message, Some(from));
                }
            }
        }

        Ok(delivered)
    }

    pub fn expire_peers(&self, now: Instant) -> usize {
        match self.peers.lock() {
            Ok(mut peers) => peers.expire(now),
            Err(_) => 0,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn send_to(&self, message: &OscMessage, addr: SocketAddr) -> Result<(), OscError> {
        let bytes = encode(message)?;
        self.socket.send_to(&bytes, addr)?;
        Ok(())
    }

    fn send_to_peers(&self, message: &OscMessage, except: Option<SocketAddr>) {
        let targets: Vec<SocketAddr> = match self.peers.lock() {
            Ok(peers) => peers.addrs().filter(|a| Some(*a) != except).collect(),
            Err(_) => return,
        };
        if targets.is_empty() {
            return;
        }

        let bytes = match encode(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(addr = %message.addr, error = %e, "cannot encode OSC message");
                return;
            }
        };
        for target in targets {
            if let Err(e) = self.socket.send_to(&bytes, target) {
                debug!(%target, error = %e, "OSC send failed");
            }
        }
    }
}

impl OscOutput for OscServer {
    fn broadcast(&self, message: &OscMessage) {
        self.send_to_peers(message, None);
    }
}

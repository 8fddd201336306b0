// Peer registry - remote OSC endpoints that receive feedback

use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_PEERS: usize = 2;
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
    pub last_seen: Instant,
}

/// Small fixed-size set of peers. A peer is identified by its IP; the
/// port is refreshed on every message.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    peers: Vec<Peer>,
    max_peers: usize,
    timeout: Duration,
}

impl PeerRegistry {
    pub fn new(max_peers: usize, timeout: Duration) -> Self {
        Self {
            peers: Vec::with_capacity(max_peers),
            max_peers: max_peers.max(1),
            timeout,
        }
    }

    /// Register activity from `addr`. Returns true when the peer is new.
    /// A full registry evicts the least recently seen peer.
    pub fn touch(&mut self, addr: SocketAddr, now: Instant) -> bool {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.addr.ip() == addr.ip()) {
            peer.addr = addr;
            peer.last_seen = now;
            return false;
        }

        let peer = Peer {
            addr,
            last_seen: now,
        };
        if self.peers.len() < self.max_peers {
            self.peers.push(peer);
        } else if let Some(oldest) = self.peers.iter_mut().min_by_key(|p| p.last_seen) {
            *oldest = peer;
        }
        true
    }

    /// Drop peers silent for longer than the timeout; returns how many
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.peers.len();
        let timeout = self.timeout;
        self.peers
            .retain(|p| now.saturating_duration_since(p.last_seen) <= timeout);
        before - self.peers.len()
    }

    pub fn addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.peers.iter().map(|p| p.addr)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PEERS, DEFAULT_PEER_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8, port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 0, last], port))
    }

    #[test]
    fn test_same_ip_refreshes() {
        let mut peers = PeerRegistry::default();
        let now = Instant::now();
        assert!(peers.touch(addr(2, 9000), now));
        assert!(!peers.touch(addr(2, 9001), now + Duration::from_secs(1)));
        assert_eq!(peers.len(), 1);
        assert_eq!(peers.addrs().next(), Some(addr(2, 9001)));
    }

    #[test]
    fn test_full_registry_replaces_oldest() {
        let mut peers = PeerRegistry::new(2, DEFAULT_PEER_TIMEOUT);
        let now = Instant::now();
        peers.touch(addr(1, 9000), now);
        peers.touch(addr(2, 9000), now + Duration::from_secs(1));
        peers.touch(addr(1, 9000), now + Duration::from_secs(2));
        peers.touch(addr(3, 9000), now + Duration::from_secs(3));

        let mut ips: Vec<_> = peers.addrs().map(|a| a.ip()).collect();
        ips.sort();
        assert_eq!(ips, vec![addr(1, 0).ip(), addr(3, 0).ip()]);
    }

    #[test]
    fn test_expire() {
        let mut peers = PeerRegistry::new(2, Duration::from_secs(120));
        let now = Instant::now();
        peers.touch(addr(1, 9000), now);
        peers.touch(addr(2, 9000), now + Duration::from_secs(60));
        assert_eq!(peers.expire(now + Duration::from_secs(120)), 0);
        assert_eq!(peers.expire(now + Duration::from_secs(121)), 1);
        assert_eq!(peers.len(), 1);
    }
}

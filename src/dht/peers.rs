use std::collections::HashSet;
use std::net::SocketAddr;

use dashmap::DashMap;

/// Announced peers per info-hash, used to answer standard-mode `get_peers`.
///
/// Repeated announces from the same peer collapse into one entry; each hash
/// keeps at most `max_per_hash` peers.
pub struct PeersManager {
    max_per_hash: usize,
    peers: DashMap<[u8; 20], HashSet<SocketAddr>>,
}

impl PeersManager {
    pub fn new(max_per_hash: usize) -> Self {
        Self {
            max_per_hash,
            peers: DashMap::new(),
        }
    }

    /// Records a peer for an info-hash. Returns `true` if the peer was new.
    pub fn insert(&self, info_hash: [u8; 20], peer: SocketAddr) -> bool {
        let mut set = self.peers.entry(info_hash).or_default();
        if set.len() >= self.max_per_hash && !set.contains(&peer) {
            return false;
        }
        set.insert(peer)
    }

    /// Returns up to `n` known peers for an info-hash.
    pub fn get(&self, info_hash: &[u8; 20], n: usize) -> Vec<SocketAddr> {
        self.peers
            .get(info_hash)
            .map(|set| set.iter().take(n).copied().collect())
            .unwrap_or_default()
    }

    /// Number of info-hashes with at least one known peer.
    pub fn hash_count(&self) -> usize {
        self.peers.len()
    }

    /// Number of peers recorded for an info-hash.
    pub fn peer_count(&self, info_hash: &[u8; 20]) -> usize {
        self.peers.get(info_hash).map(|s| s.len()).unwrap_or(0)
    }
}

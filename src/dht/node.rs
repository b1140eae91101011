use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng as _;

use super::error::DhtError;
use crate::constants::{COMPACT_NODE_LEN, ID_BITS, ID_BYTES};

/// A 160-bit node identifier (also used for info-hash distance math).
///
/// IDs compare lexically; XOR distance to a target gives the Kademlia
/// metric. Bit positions count from the most significant bit of the first
/// byte, which is the order the routing trie consumes them in.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; ID_BYTES]);

impl NodeId {
    /// Generates a uniformly random ID.
    pub fn random() -> Self {
        let mut id = [0u8; ID_BYTES];
        rand::rng().fill(&mut id);
        Self(id)
    }

    /// Creates an ID from a 20-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DhtError> {
        let arr: [u8; ID_BYTES] = bytes.try_into().map_err(|_| DhtError::InvalidNodeId)?;
        Ok(Self(arr))
    }

    /// Parses a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, DhtError> {
        let bytes = hex::decode(s).map_err(|_| DhtError::InvalidNodeId)?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw ID bytes.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// XOR distance to another ID.
    pub fn distance(&self, other: &NodeId) -> [u8; ID_BYTES] {
        let mut dist = [0u8; ID_BYTES];
        for (i, d) in dist.iter_mut().enumerate() {
            *d = self.0[i] ^ other.0[i];
        }
        dist
    }

    /// Returns bit `i` (0 = most significant bit of byte 0).
    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < ID_BITS);
        self.0[i / 8] & (0x80 >> (i % 8)) != 0
    }

    /// Sets bit `i` to `value`.
    pub fn set_bit(&mut self, i: usize, value: bool) {
        debug_assert!(i < ID_BITS);
        let mask = 0x80 >> (i % 8);
        if value {
            self.0[i / 8] |= mask;
        } else {
            self.0[i / 8] &= !mask;
        }
    }

    /// Flips bit `i`.
    pub fn flip_bit(&mut self, i: usize) {
        debug_assert!(i < ID_BITS);
        self.0[i / 8] ^= 0x80 >> (i % 8);
    }

    /// Length of the common bit prefix with another ID (0..=160).
    pub fn common_prefix_len(&self, other: &NodeId) -> usize {
        for (i, byte) in self.distance(other).iter().enumerate() {
            if *byte != 0 {
                return i * 8 + byte.leading_zeros() as usize;
            }
        }
        ID_BITS
    }

    /// Returns a random ID sharing the first `bits` bits with `self`.
    pub fn random_within(&self, bits: usize) -> NodeId {
        let mut id = NodeId::random();
        for i in 0..bits.min(ID_BITS) {
            id.set_bit(i, self.bit(i));
        }
        id
    }

    /// Crawl-mode source ID for a query about `target`: the first 15 bytes
    /// of the target with our own last 5 bytes, so replies route back while
    /// appearing close to the queried key.
    pub fn impersonate(&self, target: &NodeId) -> NodeId {
        let mut id = *target;
        id.0[15..].copy_from_slice(&self.0[15..]);
        id
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A known DHT node: identity, address, and when we last heard from it.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub addr: SocketAddr,
    pub last_active: Instant,
}

impl Node {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_active: Instant::now(),
        }
    }

    /// Marks the node as just heard from.
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Whether the node is stale. A zero `ttl` (crawl configuration) makes
    /// every node count as stale.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_active.elapsed() > ttl
    }

    /// Parses one 26-byte compact node entry (BEP-5).
    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != COMPACT_NODE_LEN {
            return None;
        }

        let id = NodeId::from_bytes(&data[..ID_BYTES]).ok()?;
        let ip = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let port = u16::from_be_bytes([data[24], data[25]]);

        if port == 0 {
            return None;
        }

        Some(Self::new(id, SocketAddr::new(IpAddr::V4(ip), port)))
    }

    /// Emits the 26-byte compact encoding; IPv6 nodes have none.
    pub fn to_compact(&self) -> Option<[u8; COMPACT_NODE_LEN]> {
        let SocketAddr::V4(v4) = self.addr else {
            return None;
        };

        let mut compact = [0u8; COMPACT_NODE_LEN];
        compact[..ID_BYTES].copy_from_slice(&self.id.0);
        compact[20..24].copy_from_slice(&v4.ip().octets());
        compact[24..26].copy_from_slice(&v4.port().to_be_bytes());
        Some(compact)
    }
}

/// Packs nodes into the concatenated compact `nodes` blob.
pub fn pack_nodes(nodes: &[Node]) -> Bytes {
    let mut buf = BytesMut::with_capacity(nodes.len() * COMPACT_NODE_LEN);
    for node in nodes {
        if let Some(compact) = node.to_compact() {
            buf.put_slice(&compact);
        }
    }
    buf.freeze()
}

/// Unpacks a compact `nodes` blob, skipping malformed entries.
pub fn unpack_nodes(data: &[u8]) -> Vec<Node> {
    data.chunks_exact(COMPACT_NODE_LEN)
        .filter_map(Node::from_compact)
        .collect()
}

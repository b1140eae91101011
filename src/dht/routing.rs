use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::Rng as _;

use super::node::{Node, NodeId};
use crate::constants::ID_BITS;

/// A bit-prefix of the ID space: all IDs sharing the first `len` bits of
/// `base`.
#[derive(Debug, Clone, Copy)]
struct Prefix {
    base: NodeId,
    len: usize,
}

impl Prefix {
    fn all() -> Self {
        Self {
            base: NodeId([0u8; 20]),
            len: 0,
        }
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.base.common_prefix_len(id) >= self.len
    }

    fn child(&self, bit: bool) -> Self {
        let mut base = self.base;
        base.set_bit(self.len, bit);
        Self {
            base,
            len: self.len + 1,
        }
    }

    /// A random ID inside this prefix.
    fn random_id(&self) -> NodeId {
        self.base.random_within(self.len)
    }
}

#[derive(Debug)]
struct Bucket {
    prefix: Prefix,
    nodes: VecDeque<Node>,
    last_changed: Instant,
}

impl Bucket {
    fn new(prefix: Prefix) -> Self {
        Self {
            prefix,
            nodes: VecDeque::new(),
            last_changed: Instant::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.last_changed.elapsed() > ttl
    }
}

enum TrieNode {
    Leaf(Bucket),
    Branch {
        zero: Box<TrieNode>,
        one: Box<TrieNode>,
    },
}

impl TrieNode {
    /// Splits a leaf into a branch with two child buckets, moving each node
    /// to the side its next bit selects.
    fn split(&mut self) {
        let TrieNode::Leaf(bucket) = self else {
            return;
        };

        let depth = bucket.prefix.len;
        let mut zero = Bucket::new(bucket.prefix.child(false));
        let mut one = Bucket::new(bucket.prefix.child(true));

        for node in bucket.nodes.drain(..) {
            if node.id.bit(depth) {
                one.nodes.push_back(node);
            } else {
                zero.nodes.push_back(node);
            }
        }

        *self = TrieNode::Branch {
            zero: Box::new(TrieNode::Leaf(zero)),
            one: Box::new(TrieNode::Leaf(one)),
        };
    }

    fn leaf_for_mut(&mut self, id: &NodeId) -> &mut Bucket {
        let mut cur = self;
        let mut depth = 0;
        loop {
            match cur {
                TrieNode::Leaf(bucket) => return bucket,
                TrieNode::Branch { zero, one } => {
                    cur = if id.bit(depth) { one } else { zero };
                    depth += 1;
                }
            }
        }
    }

    fn for_each_bucket(&self, f: &mut impl FnMut(&Bucket)) {
        match self {
            TrieNode::Leaf(bucket) => f(bucket),
            TrieNode::Branch { zero, one } => {
                zero.for_each_bucket(f);
                one.for_each_bucket(f);
            }
        }
    }

    fn for_each_bucket_mut(&mut self, f: &mut impl FnMut(&mut Bucket)) {
        match self {
            TrieNode::Leaf(bucket) => f(bucket),
            TrieNode::Branch { zero, one } => {
                zero.for_each_bucket_mut(f);
                one.for_each_bucket_mut(f);
            }
        }
    }
}

struct Trie {
    root: TrieNode,
    len: usize,
}

/// Routing table: a binary trie on node-ID bit prefixes where every leaf
/// owns one k-bucket.
///
/// In standard mode buckets hold at most `bucket_cap` nodes and only the
/// leaf covering the local ID may split when full. In crawl mode the cap is
/// effectively unbounded; once `max_nodes` is reached the table sheds its
/// oldest entry without a liveness check, trading accuracy for harvest
/// throughput.
pub struct RoutingTable {
    local_id: NodeId,
    bucket_cap: usize,
    max_nodes: usize,
    crawl: bool,
    node_ttl: Duration,
    bucket_ttl: Duration,
    inner: RwLock<Trie>,
}

impl RoutingTable {
    pub fn new(
        local_id: NodeId,
        bucket_cap: usize,
        max_nodes: usize,
        crawl: bool,
        node_ttl: Duration,
        bucket_ttl: Duration,
    ) -> Self {
        Self {
            local_id,
            bucket_cap,
            max_nodes,
            crawl,
            node_ttl,
            bucket_ttl,
            inner: RwLock::new(Trie {
                root: TrieNode::Leaf(Bucket::new(Prefix::all())),
                len: 0,
            }),
        }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn len(&self) -> usize {
        self.inner.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or refreshes a node. Returns `false` only when the node was
    /// dropped because its bucket is full of live entries.
    pub fn insert(&self, node: Node) -> bool {
        if node.id == self.local_id {
            return false;
        }

        let mut guard = self.inner.write();
        let trie = &mut *guard;
        self.insert_at(&mut trie.root, node, 0, &mut trie.len)
    }

    fn insert_at(&self, cur: &mut TrieNode, node: Node, depth: usize, len: &mut usize) -> bool {
        match cur {
            TrieNode::Branch { zero, one } => {
                let next = if node.id.bit(depth) { one } else { zero };
                self.insert_at(next, node, depth + 1, len)
            }
            TrieNode::Leaf(bucket) => {
                if let Some(pos) = bucket.nodes.iter().position(|n| n.id == node.id) {
                    let mut existing = bucket.nodes.remove(pos).unwrap();
                    existing.addr = node.addr;
                    existing.touch();
                    bucket.nodes.push_back(existing);
                    bucket.last_changed = Instant::now();
                    return true;
                }

                if self.crawl && *len >= self.max_nodes {
                    // Throughput over accuracy: shed the oldest entry in the
                    // target bucket without checking liveness.
                    if bucket.nodes.pop_front().is_none() {
                        return false;
                    }
                    bucket.nodes.push_back(node);
                    bucket.last_changed = Instant::now();
                    return true;
                }

                if bucket.nodes.len() < self.bucket_cap {
                    bucket.nodes.push_back(node);
                    bucket.last_changed = Instant::now();
                    *len += 1;
                    return true;
                }

                if !bucket.prefix.contains(&self.local_id) || bucket.prefix.len >= ID_BITS {
                    // Full foreign bucket: replace an expired node or drop
                    // the newcomer if everyone is live.
                    if let Some(pos) = bucket
                        .nodes
                        .iter()
                        .position(|n| n.is_expired(self.node_ttl))
                    {
                        bucket.nodes.remove(pos);
                        bucket.nodes.push_back(node);
                        bucket.last_changed = Instant::now();
                        return true;
                    }
                    return false;
                }

                cur.split();
                self.insert_at(cur, node, depth, len)
            }
        }
    }

    /// Refreshes a node's freshness; inserts it when absent.
    pub fn touch(&self, id: NodeId, addr: SocketAddr) {
        self.insert(Node::new(id, addr));
    }

    /// Removes a node by ID.
    pub fn remove(&self, id: &NodeId) {
        let mut guard = self.inner.write();
        let trie = &mut *guard;
        let bucket = trie.root.leaf_for_mut(id);
        if let Some(pos) = bucket.nodes.iter().position(|n| &n.id == id) {
            bucket.nodes.remove(pos);
            trie.len -= 1;
        }
    }

    /// Returns up to `n` nodes nearest to `target` by XOR distance,
    /// ascending; ties broken by recency.
    pub fn neighbors(&self, target: &NodeId, n: usize) -> Vec<Node> {
        let trie = self.inner.read();

        let mut candidates: Vec<(Node, [u8; 20])> = Vec::with_capacity(trie.len);
        trie.root.for_each_bucket(&mut |bucket| {
            for node in &bucket.nodes {
                candidates.push((node.clone(), node.id.distance(target)));
            }
        });

        candidates.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| b.0.last_active.cmp(&a.0.last_active))
        });
        candidates.truncate(n);
        candidates.into_iter().map(|(node, _)| node).collect()
    }

    /// Plans refreshes: for every stale bucket, up to `refresh_num`
    /// `find_node` targets inside the bucket's prefix, each paired with a
    /// random node from that bucket to ask. Planned buckets are marked
    /// fresh so the next tick does not replan them (a zero bucket TTL makes
    /// every bucket permanently stale, which is the crawl configuration).
    pub fn refresh_plan(&self, refresh_num: usize) -> Vec<(Node, NodeId)> {
        let mut guard = self.inner.write();
        let trie = &mut *guard;
        let bucket_ttl = self.bucket_ttl;
        let mut plan = Vec::new();
        let mut rng = rand::rng();

        trie.root.for_each_bucket_mut(&mut |bucket| {
            if bucket.nodes.is_empty() || !bucket.is_stale(bucket_ttl) {
                return;
            }

            for _ in 0..refresh_num {
                let target = bucket.prefix.random_id();
                let pick = rng.random_range(0..bucket.nodes.len());
                plan.push((bucket.nodes[pick].clone(), target));
            }

            bucket.last_changed = Instant::now();
        });

        plan
    }

    /// Drops nodes stale past the node TTL. A zero TTL disables pruning;
    /// crawl mode relies on `max_nodes` eviction instead.
    pub fn prune_expired(&self) {
        if self.node_ttl.is_zero() {
            return;
        }

        let mut guard = self.inner.write();
        let trie = &mut *guard;
        let ttl = self.node_ttl;
        let mut removed = 0usize;

        trie.root.for_each_bucket_mut(&mut |bucket| {
            let before = bucket.nodes.len();
            bucket.nodes.retain(|n| !n.is_expired(ttl));
            removed += before - bucket.nodes.len();
        });

        trie.len -= removed;
    }
}

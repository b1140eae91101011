use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;

use super::krpc::KrpcQuery;
use super::node::Node;
use crate::constants::QUERY_RTO;

/// An outstanding query awaiting its response.
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub tid: u32,
    pub node: Node,
    pub query: KrpcQuery,
    pub deadline: Instant,
    pub attempts: u8,
}

/// Matches Krpc queries to responses.
///
/// Transactions are addressed by `(remote address, transaction id)`, never
/// by id alone, so a response from an address we did not query can never
/// resolve someone else's transaction.
pub struct TransactionManager {
    max_cursor: u32,
    cursor: Mutex<u32>,
    pending: Mutex<HashMap<(SocketAddr, u32), PendingQuery>>,
}

impl TransactionManager {
    pub fn new(max_cursor: u32) -> Self {
        Self {
            max_cursor: max_cursor.max(1),
            cursor: Mutex::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates the next transaction id, wrapping at the configured
    /// cursor maximum.
    pub fn next_tid(&self) -> u32 {
        let mut cursor = self.cursor.lock();
        let tid = *cursor;
        *cursor = if *cursor >= self.max_cursor {
            0
        } else {
            *cursor + 1
        };
        tid
    }

    /// Records a freshly sent query.
    pub fn register(&self, tid: u32, node: Node, query: KrpcQuery) {
        let pending = PendingQuery {
            tid,
            node: node.clone(),
            query,
            deadline: Instant::now() + QUERY_RTO,
            attempts: 1,
        };
        self.pending.lock().insert((node.addr, tid), pending);
    }

    /// Resolves the transaction for a response, if `(addr, tid)` matches an
    /// active one. A matching tid from any other address resolves nothing.
    pub fn resolve(&self, addr: SocketAddr, tid_bytes: &[u8]) -> Option<PendingQuery> {
        let tid = decode_tid(tid_bytes)?;
        self.pending.lock().remove(&(addr, tid))
    }

    /// Collects deadline work: transactions to retry (attempts bumped,
    /// deadline pushed out, still registered) and transactions that have
    /// exhausted their `tries` budget (removed).
    pub fn take_expired(&self, tries: u8) -> (Vec<PendingQuery>, Vec<PendingQuery>) {
        let now = Instant::now();
        let mut retries = Vec::new();
        let mut failed = Vec::new();

        let mut pending = self.pending.lock();
        pending.retain(|_, tx| {
            if tx.deadline > now {
                return true;
            }
            if tx.attempts < tries {
                tx.attempts += 1;
                tx.deadline = now + QUERY_RTO;
                retries.push(tx.clone());
                true
            } else {
                failed.push(tx.clone());
                false
            }
        });

        (retries, failed)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
impl TransactionManager {
    /// Test hook: pushes every deadline into the past.
    pub(crate) fn force_expire_all(&self) {
        let past = Instant::now()
            .checked_sub(std::time::Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        for tx in self.pending.lock().values_mut() {
            tx.deadline = past;
        }
    }
}

/// Wire form of a transaction id: 4 bytes big-endian.
pub fn encode_tid(tid: u32) -> Bytes {
    Bytes::copy_from_slice(&tid.to_be_bytes())
}

/// Accepts 1–4 byte `t` fields, interpreted big-endian.
pub fn decode_tid(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    let mut tid = 0u32;
    for b in bytes {
        tid = (tid << 8) | *b as u32;
    }
    Some(tid)
}

//! Store contract and reference adapters.
//!
//! The crawler treats the document store as an external collaborator: the
//! core only depends on the [`Store`] trait. The wire protocol of a real
//! deployment (MongoDB or similar) lives outside this crate; what ships
//! here is the record model, an in-memory adapter for tests and dry runs,
//! and an append-only JSON-lines adapter good enough for single-node use.
//!
//! The contract the core relies on: at-least-once insert semantics and a
//! unique key on the lowercase-hex info-hash. Re-inserting an existing hash
//! counts as a re-discovery and bumps the record's heat.

mod jsonl;
mod memory;
mod record;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use record::{CategoryCount, RecordFile, SortKey, TorrentQuery, TorrentRecord};

use std::sync::Arc;

use thiserror::Error;

/// Errors from a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The adapter cannot reach its backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The interface the ingest pipeline and the (external) query service call.
///
/// Implementations must be thread-safe; handles are shared across tasks.
pub trait Store: Send + Sync {
    /// Whether a record with this lowercase-hex info-hash exists.
    fn exists(&self, info_hash_hex: &str) -> Result<bool, StoreError>;

    /// Atomically bumps the heat counter of an existing record.
    fn increment_heat(&self, info_hash_hex: &str) -> Result<(), StoreError>;

    /// Inserts a record; re-inserting an existing info-hash bumps heat
    /// instead of duplicating.
    fn insert(&self, record: &TorrentRecord) -> Result<(), StoreError>;

    /// Number of records matching a query.
    fn count_by_filter(&self, query: &TorrentQuery) -> Result<usize, StoreError>;

    /// Records matching a query, sorted and paged per the query.
    fn find(&self, query: &TorrentQuery) -> Result<Vec<TorrentRecord>, StoreError>;

    /// Per-category record counts, descending.
    fn aggregate_categories(&self) -> Result<Vec<CategoryCount>, StoreError>;
}

/// Opens a store by URL: `mem://` for the in-memory adapter, anything else
/// is treated as a JSONL file path.
pub fn open(url: &str) -> Result<Arc<dyn Store>, StoreError> {
    if url == "mem://" || url.is_empty() {
        Ok(Arc::new(MemoryStore::new()))
    } else {
        let path = url.strip_prefix("jsonl://").unwrap_or(url);
        Ok(Arc::new(JsonlStore::open(path)?))
    }
}

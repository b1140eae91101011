//! Metadata exchange over the BitTorrent peer wire (BEP-3/10/9).
//!
//! The engine surfaces `(info_hash, peer)` pairs from `announce_peer`
//! traffic; this module turns them into raw `info` dictionaries by dialing
//! the peer, negotiating the extension protocol, requesting every
//! ut_metadata piece, and verifying the reassembled bytes against the
//! announced info-hash.
//!
//! [`MetadataFetcher`] is the scheduler: a bounded request queue, per-hash
//! and global concurrency caps, and a short dedup window per
//! `(info-hash, peer)` pair. Each admitted request becomes one
//! [`session`](self) task owning its TCP connection.

mod error;
mod extension;
mod fetcher;
mod handshake;
mod metadata;
mod session;

pub use error::WireError;
pub use extension::{ExtensionHandshake, EXTENSION_HANDSHAKE_ID, EXTENSION_MSG_ID, UT_METADATA};
pub use fetcher::{FetchedMetadata, MetadataFetcher};
pub use handshake::{Handshake, HANDSHAKE_LEN};
pub use metadata::{MetadataAssembler, MetadataMessage, MetadataMessageType};

#[cfg(test)]
mod tests;

//! btspider - a BitTorrent mainline DHT crawler
//!
//! The crawler passively participates in the DHT to discover torrent
//! info-hashes, fetches their metadata from peers via the ut_metadata
//! extension, filters the results against an operator-maintained keyword
//! policy, and persists matches to a document store.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 bencode codec; canonical encoding for info-hashes
//! - [`dht`] - BEP-5 DHT engine with a harvest-oriented crawl mode
//! - [`wire`] - BEP-9/10 metadata exchange over the peer wire
//! - [`metainfo`] - info-hashes, parsed info dictionaries, magnet URIs
//! - [`filter`] - keyword/blacklist policy
//! - [`ingest`] - dedup, categorization, store writes
//! - [`store`] - store contract plus reference adapters
//! - [`nat`] - STUN discovery and UPnP/NAT-PMP port mapping (best-effort)
//! - [`logger`] - daily-rotating operator log
//! - [`crawler`] - the assembled pipeline

pub mod bencode;
pub mod constants;
pub mod crawler;
pub mod dht;
pub mod filter;
pub mod ingest;
pub mod logger;
pub mod metainfo;
pub mod nat;
pub mod store;
pub mod wire;

pub use bencode::{decode, encode, BencodeError, Value};
pub use crawler::{Crawler, CrawlerError};
pub use dht::{Dht, DhtConfig, DhtError, DhtEvent, DhtMode, Node, NodeId};
pub use filter::KeywordFilter;
pub use ingest::{Ingest, IngestError, IngestOutcome};
pub use logger::DailyLogger;
pub use metainfo::{InfoHash, MagnetLink, MetainfoError, TorrentInfo};
pub use store::{MemoryStore, Store, StoreError, TorrentQuery, TorrentRecord};
pub use wire::{FetchedMetadata, MetadataFetcher, WireError};

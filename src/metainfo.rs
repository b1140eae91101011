//! Torrent metadata: info-hashes, parsed `info` dictionaries, magnet URIs.
//!
//! The crawler never sees `.torrent` files; everything here starts from the
//! raw `info` dictionary fetched from peers over ut_metadata (BEP-9). The
//! SHA-1 of the canonical bencoding of that dictionary is the [`InfoHash`]
//! the torrent is identified by on the network.

mod error;
mod info_hash;
mod magnet;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use magnet::MagnetLink;
pub use torrent::{TorrentFile, TorrentInfo};

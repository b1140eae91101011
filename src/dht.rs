//! Distributed Hash Table engine ([BEP-5]).
//!
//! A Kademlia-like DHT node built for harvesting: besides the standard
//! `ping` / `find_node` / `get_peers` / `announce_peer` behavior it has a
//! *crawl mode* that over-fills buckets and impersonates IDs close to
//! queried targets to maximize the number of info-hashes observed.
//!
//! # Overview
//!
//! ```no_run
//! use btspider::dht::{Dht, DhtConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dht = Dht::bind(DhtConfig::crawl()).await?;
//! let mut events = dht.subscribe();
//!
//! tokio::spawn(dht.clone().run());
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`Dht`] — UDP loop, worker pool, Krpc handlers, mode policy
//! - [`RoutingTable`] — binary trie of k-buckets
//! - [`TransactionManager`] — query/response matching keyed by `(addr, txId)`
//! - [`TokenManager`] / [`BlackList`] — announce tokens, misbehaving remotes
//! - [`PeersManager`] — announced peers per info-hash
//!
//! [BEP-5]: http://bittorrent.org/beps/bep_0005.html

mod blacklist;
mod engine;
mod error;
mod krpc;
mod node;
mod peers;
mod routing;
mod token;
mod transaction;

pub use blacklist::BlackList;
pub use engine::{Dht, DhtConfig, DhtEvent, DhtMode, Network};
pub use error::DhtError;
pub use krpc::{KrpcBody, KrpcMessage, KrpcQuery, KrpcResponseBody};
pub use node::{Node, NodeId};
pub use peers::PeersManager;
pub use routing::RoutingTable;
pub use token::TokenManager;
pub use transaction::{PendingQuery, TransactionManager};

#[cfg(test)]
mod tests;

//! Protocol constants and tuning parameters.
//!
//! Defaults follow the mainline DHT conventions (BEP-5) and the values used
//! by widely deployed crawlers. Anything the engine or wire exposes as a
//! config knob has its default here.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Peer ID prefix for the metadata fetcher (Azureus-style).
pub const CLIENT_PREFIX: &str = "-BS0001-";

// ============================================================================
// DHT protocol
// ============================================================================

/// Kademlia replication parameter (bucket size in standard mode).
pub const K: usize = 8;

/// Bits in a node ID / info-hash.
pub const ID_BITS: usize = 160;

/// Bytes in a node ID / info-hash.
pub const ID_BYTES: usize = 20;

/// Compact node encoding: 20-byte ID + 4-byte IPv4 + 2-byte port.
pub const COMPACT_NODE_LEN: usize = 26;

/// Compact peer encoding: 4-byte IPv4 + 2-byte port.
pub const COMPACT_PEER_LEN: usize = 6;

/// Smallest packet that can hold a well-formed Krpc message.
pub const MIN_PACKET_LEN: usize = 10;

/// Largest UDP datagram we read.
pub const MAX_PACKET_LEN: usize = 8192;

/// Well-known DHT bootstrap nodes.
pub const PRIME_NODES: &[&str] = &[
    "router.bittorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "router.utorrent.com:6881",
    "dht.libtorrent.org:25401",
    "dht.aelitis.com:6881",
    "router.bitcomet.com:6881",
];

// ============================================================================
// DHT timing
// ============================================================================

/// Retransmission timeout for an outstanding Krpc query.
pub const QUERY_RTO: Duration = Duration::from_secs(5);

/// How often the transaction sweeper scans for deadlines.
pub const TRANSACTION_SWEEP_PERIOD: Duration = Duration::from_millis(500);

/// Node freshness horizon in standard mode.
pub const NODE_EXPIRED_AFTER: Duration = Duration::from_secs(15 * 60);

/// Bucket freshness horizon in standard mode.
pub const BUCKET_EXPIRED_AFTER: Duration = Duration::from_secs(15 * 60);

/// Bucket refresh check period in standard mode.
pub const CHECK_BUCKET_PERIOD: Duration = Duration::from_secs(30);

/// Bucket refresh check period in crawl mode.
pub const CRAWL_CHECK_BUCKET_PERIOD: Duration = Duration::from_secs(5);

/// Announce token lifetime.
pub const TOKEN_EXPIRED_AFTER: Duration = Duration::from_secs(10 * 60);

/// Blacklist entry lifetime.
pub const BLACKLIST_EXPIRED_AFTER: Duration = Duration::from_secs(60 * 60);

/// Stats monitor period.
pub const STATS_PERIOD: Duration = Duration::from_secs(5);

/// NAT mapping refresh period.
pub const NAT_REFRESH_PERIOD: Duration = Duration::from_secs(10 * 60);

// ============================================================================
// DHT capacity
// ============================================================================

/// Default routing table node cap.
pub const MAX_NODES: usize = 5000;

/// Default blacklist capacity.
pub const BLACKLIST_MAX_SIZE: usize = 65536;

/// Default bounded inbound packet queue length.
pub const PACKET_JOB_LIMIT: usize = 1024;

/// Default packet worker pool size.
pub const PACKET_WORKER_LIMIT: usize = 256;

/// Nodes refreshed per stale bucket in standard mode.
pub const REFRESH_NODE_NUM: usize = 16;

/// Nodes refreshed per stale bucket in crawl mode.
pub const CRAWL_REFRESH_NODE_NUM: usize = 512;

/// Query retry budget before a node is written off.
pub const QUERY_TRY: u8 = 2;

/// Soft cap on outstanding queries; iterative walks pause above this.
pub const MAX_PENDING_QUERIES: usize = 8192;

/// Peers kept per info-hash for standard-mode `get_peers` answers.
pub const MAX_PEERS_PER_HASH: usize = 256;

/// Event channel capacity between the engine and its consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 4096;

// ============================================================================
// Metadata wire (BEP-9/10)
// ============================================================================

/// Metadata piece size (BEP-9).
pub const METADATA_PIECE_SIZE: usize = 16384;

/// Sanity cap on `metadata_size`; anything larger is rejected.
pub const MAX_METADATA_SIZE: usize = 10 * 1024 * 1024;

/// Default per-connection read buffer cap.
pub const DOWNLOAD_BUFFER_SIZE: usize = 65536;

/// Default number of peers tracked per info-hash.
pub const PEERS_PER_INFOHASH: usize = 1024;

/// Default number of concurrently active fetch sessions.
pub const FETCH_CONCURRENCY: usize = 256;

/// Deadline for each wire stage (dial, handshake, one read).
pub const WIRE_STAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Deadline for a whole fetch session.
pub const WIRE_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a (info-hash, peer) pair is remembered to suppress re-dials.
pub const FETCH_DEDUP_WINDOW: Duration = Duration::from_secs(5 * 60);

/// How long a misbehaving peer is refused new sessions.
pub const PEER_BAN_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Bounded fetch request queue length.
pub const FETCH_QUEUE_LIMIT: usize = 4096;

// ============================================================================
// NAT helpers
// ============================================================================

/// SSDP port for UPnP gateway discovery.
pub const SSDP_PORT: u16 = 1900;

/// SSDP multicast address.
pub const SSDP_MULTICAST: &str = "239.255.255.250";

/// NAT-PMP port.
pub const NATPMP_PORT: u16 = 5351;

/// UPnP SSDP discovery timeout.
pub const UPNP_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// UPnP SOAP request timeout.
pub const UPNP_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// NAT-PMP probe read timeout.
pub const NATPMP_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// STUN response timeout.
pub const STUN_TIMEOUT: Duration = Duration::from_secs(5);

/// Port-mapping lease we request, in seconds.
pub const NAT_LEASE_SECONDS: u32 = 3600;

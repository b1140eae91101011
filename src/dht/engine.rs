use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::blacklist::BlackList;
use super::error::DhtError;
use super::krpc::{KrpcBody, KrpcMessage, KrpcQuery, KrpcResponseBody, ERR_PROTOCOL};
use super::node::{Node, NodeId};
use super::peers::PeersManager;
use super::routing::RoutingTable;
use super::token::TokenManager;
use super::transaction::{encode_tid, TransactionManager};
use crate::constants::{
    BLACKLIST_EXPIRED_AFTER, BLACKLIST_MAX_SIZE, BUCKET_EXPIRED_AFTER, CHECK_BUCKET_PERIOD,
    CRAWL_CHECK_BUCKET_PERIOD, CRAWL_REFRESH_NODE_NUM, EVENT_CHANNEL_CAPACITY, K,
    MAX_NODES, MAX_PACKET_LEN, MAX_PEERS_PER_HASH, MAX_PENDING_QUERIES, MIN_PACKET_LEN,
    NAT_REFRESH_PERIOD, NODE_EXPIRED_AFTER, PACKET_JOB_LIMIT, PACKET_WORKER_LIMIT, PRIME_NODES,
    QUERY_TRY, REFRESH_NODE_NUM, STATS_PERIOD, TOKEN_EXPIRED_AFTER, TRANSACTION_SWEEP_PERIOD,
};
use crate::nat::NatService;

/// Operating mode of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtMode {
    /// Follow the protocol: bounded buckets, token-checked announces.
    Standard,
    /// Harvest info-hashes: unbounded buckets, impersonated query IDs,
    /// announces accepted regardless of token.
    Crawl,
}

/// UDP address family selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Udp4,
    Udp6,
    Udp,
}

/// Engine configuration. `standard()` and `crawl()` give the two canonical
/// profiles; every knob can be overridden after that.
#[derive(Debug, Clone)]
pub struct DhtConfig {
    pub mode: DhtMode,
    pub k: usize,
    pub k_bucket_size: usize,
    pub network: Network,
    pub address: String,
    pub prime_nodes: Vec<String>,
    pub node_expired_after: Duration,
    pub k_bucket_expired_after: Duration,
    pub check_k_bucket_period: Duration,
    pub token_expired_after: Duration,
    pub max_transaction_cursor: u32,
    pub max_nodes: usize,
    pub blocked_ips: Vec<IpAddr>,
    pub black_list_max_size: usize,
    pub tries: u8,
    pub packet_job_limit: usize,
    pub packet_worker_limit: usize,
    pub refresh_node_num: usize,
    /// Attempt STUN discovery and UPnP/NAT-PMP port mapping at bind time.
    pub nat: bool,
}

impl DhtConfig {
    /// Standard-mode defaults (mainline K = 8, 15-minute freshness).
    pub fn standard() -> Self {
        Self {
            mode: DhtMode::Standard,
            k: K,
            k_bucket_size: K,
            network: Network::Udp4,
            address: ":6881".to_string(),
            prime_nodes: PRIME_NODES.iter().map(|s| s.to_string()).collect(),
            node_expired_after: NODE_EXPIRED_AFTER,
            k_bucket_expired_after: BUCKET_EXPIRED_AFTER,
            check_k_bucket_period: CHECK_BUCKET_PERIOD,
            token_expired_after: TOKEN_EXPIRED_AFTER,
            max_transaction_cursor: u32::MAX,
            max_nodes: MAX_NODES,
            blocked_ips: Vec::new(),
            black_list_max_size: BLACKLIST_MAX_SIZE,
            tries: QUERY_TRY,
            packet_job_limit: PACKET_JOB_LIMIT,
            packet_worker_limit: PACKET_WORKER_LIMIT,
            refresh_node_num: REFRESH_NODE_NUM,
            nat: false,
        }
    }

    /// Crawl-mode defaults: one effectively unbounded bucket space, zero
    /// freshness horizons (everything always stale), heavy refresh.
    pub fn crawl() -> Self {
        Self {
            mode: DhtMode::Crawl,
            k_bucket_size: usize::MAX,
            node_expired_after: Duration::ZERO,
            k_bucket_expired_after: Duration::ZERO,
            check_k_bucket_period: CRAWL_CHECK_BUCKET_PERIOD,
            refresh_node_num: CRAWL_REFRESH_NODE_NUM,
            ..Self::standard()
        }
    }
}

/// What the engine observed on the network. Consumers receive these on the
/// channel returned by [`Dht::subscribe`].
#[derive(Debug, Clone)]
pub enum DhtEvent {
    /// A remote asked us for peers of an info-hash.
    GetPeers {
        info_hash: [u8; 20],
        from: SocketAddr,
    },
    /// A `get_peers` response carried a peer for an info-hash.
    PeersFound {
        info_hash: [u8; 20],
        peer: SocketAddr,
    },
    /// A remote announced itself as a peer for an info-hash.
    AnnouncePeer {
        info_hash: [u8; 20],
        peer: SocketAddr,
    },
}

#[derive(Default)]
struct Stats {
    packets: AtomicU64,
    dropped: AtomicU64,
    queries: AtomicU64,
    responses: AtomicU64,
    announces: AtomicU64,
    peers_found: AtomicU64,
    unique_peers: Mutex<HashSet<SocketAddr>>,
}

const UNIQUE_PEER_TRACK_LIMIT: usize = 1 << 20;

impl Stats {
    fn track_peer(&self, peer: SocketAddr) {
        let mut set = self.unique_peers.lock();
        if set.len() < UNIQUE_PEER_TRACK_LIMIT {
            set.insert(peer);
        }
    }
}

/// The DHT engine.
///
/// Create with [`Dht::bind`], attach an event consumer with
/// [`Dht::subscribe`], then drive it with [`Dht::run`]. `run` completes
/// after [`Dht::stop`].
pub struct Dht {
    config: DhtConfig,
    id: NodeId,
    socket: UdpSocket,
    routing: RoutingTable,
    transactions: TransactionManager,
    tokens: TokenManager,
    blacklist: BlackList,
    peers: PeersManager,
    events: RwLock<Option<mpsc::Sender<DhtEvent>>>,
    shutdown: watch::Sender<bool>,
    ready: AtomicBool,
    stats: Stats,
    boot_status: Mutex<HashMap<SocketAddr, bool>>,
    nat: tokio::sync::Mutex<Option<NatService>>,
}

impl Dht {
    /// Binds the UDP socket and prepares the engine. Bind failure is fatal;
    /// NAT setup (when enabled) is best-effort and never fails the bind.
    pub async fn bind(config: DhtConfig) -> Result<Arc<Self>, DhtError> {
        let addr = parse_listen_addr(&config.address, config.network)?;

        // STUN wants to probe from the DHT port, so NAT setup runs before
        // the socket takes it.
        let nat = if config.nat && addr.port() != 0 {
            Some(NatService::setup(addr.port()).await)
        } else {
            None
        };

        let socket = UdpSocket::bind(addr).await?;
        let local = socket.local_addr()?;
        let id = NodeId::random();

        info!(%local, node_id = %id, mode = ?config.mode, "dht engine bound");

        let blacklist = BlackList::new(config.black_list_max_size, BLACKLIST_EXPIRED_AFTER);
        for ip in &config.blocked_ips {
            blacklist.insert(*ip, None);
        }

        let routing = RoutingTable::new(
            id,
            config.k_bucket_size,
            config.max_nodes,
            config.mode == DhtMode::Crawl,
            config.node_expired_after,
            config.k_bucket_expired_after,
        );

        let (shutdown, _) = watch::channel(false);

        Ok(Arc::new(Self {
            id,
            routing,
            transactions: TransactionManager::new(config.max_transaction_cursor),
            tokens: TokenManager::new(config.token_expired_after),
            blacklist,
            peers: PeersManager::new(MAX_PEERS_PER_HASH),
            events: RwLock::new(None),
            shutdown,
            ready: AtomicBool::new(false),
            stats: Stats::default(),
            boot_status: Mutex::new(HashMap::new()),
            nat: tokio::sync::Mutex::new(nat),
            socket,
            config,
        }))
    }

    /// Attaches the event consumer. Must be called before [`Dht::get_peers`].
    pub fn subscribe(&self) -> mpsc::Receiver<DhtEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *self.events.write() = Some(tx);
        rx
    }

    pub fn our_id(&self) -> &NodeId {
        &self.id
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DhtError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn node_count(&self) -> usize {
        self.routing.len()
    }

    /// Runs the engine until [`Dht::stop`]. Spawns the reader, sweepers and
    /// stats tasks, joins the network, then dispatches packets to a bounded
    /// worker pool.
    pub async fn run(self: Arc<Self>) -> Result<(), DhtError> {
        let (pkt_tx, mut pkt_rx) = mpsc::channel::<(Vec<u8>, SocketAddr)>(
            self.config.packet_job_limit.max(1),
        );

        let mut tasks = Vec::new();
        {
            let this = self.clone();
            tasks.push(tokio::spawn(async move { this.read_loop(pkt_tx).await }));
        }
        {
            let this = self.clone();
            tasks.push(tokio::spawn(async move { this.transaction_loop().await }));
        }
        {
            let this = self.clone();
            tasks.push(tokio::spawn(async move { this.sweeper_loop().await }));
        }
        {
            let this = self.clone();
            tasks.push(tokio::spawn(async move { this.stats_loop().await }));
        }

        self.join().await;
        self.ready.store(true, Ordering::SeqCst);

        let workers = Arc::new(Semaphore::new(self.config.packet_worker_limit.max(1)));
        let mut shutdown = self.shutdown.subscribe();
        let stopped_early = *shutdown.borrow();

        let mut check = interval(self.config.check_k_bucket_period);
        check.set_missed_tick_behavior(MissedTickBehavior::Skip);
        check.tick().await;

        let mut nat_tick = interval(NAT_REFRESH_PERIOD);
        nat_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        nat_tick.tick().await;

        while !stopped_early {
            tokio::select! {
                _ = shutdown.changed() => break,
                packet = pkt_rx.recv() => {
                    let Some((data, addr)) = packet else { break };
                    let Ok(permit) = workers.clone().acquire_owned().await else { break };
                    let this = self.clone();
                    tokio::spawn(async move {
                        this.handle_packet(&data, addr).await;
                        drop(permit);
                    });
                }
                _ = check.tick() => {
                    if self.routing.is_empty() {
                        self.join().await;
                    } else if self.transactions.is_empty() {
                        self.routing.prune_expired();
                        self.refresh_buckets().await;
                    }
                }
                _ = nat_tick.tick() => {
                    if let Some(nat) = self.nat.lock().await.as_mut() {
                        nat.refresh().await;
                    }
                }
            }
        }

        self.ready.store(false, Ordering::SeqCst);
        for task in tasks {
            task.abort();
        }

        info!("dht engine run loop finished");
        Ok(())
    }

    /// Signals shutdown and tears down NAT mappings. Tasks observe the
    /// signal at their next suspension point.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);

        if let Some(mut nat) = self.nat.lock().await.take() {
            nat.shutdown().await;
        }

        self.ready.store(false, Ordering::SeqCst);
        info!("dht engine stopped");
    }

    /// Emits `get_peers` for a hex info-hash to the closest `k` neighbors.
    ///
    /// # Errors
    ///
    /// `DhtError::NotReady` before `run` has joined the network, and
    /// `DhtError::Config` when no event subscriber is attached (the results
    /// would have nowhere to go).
    pub async fn get_peers(&self, info_hash_hex: &str) -> Result<(), DhtError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(DhtError::NotReady);
        }
        if self.events.read().is_none() {
            return Err(DhtError::Config("get_peers requires an event subscriber"));
        }

        let info_hash: [u8; 20] = hex::decode(info_hash_hex)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or(DhtError::InvalidNodeId)?;

        let target = NodeId(info_hash);
        for node in self.routing.neighbors(&target, self.config.k) {
            self.send_query(node, KrpcQuery::GetPeers { info_hash }).await;
        }

        Ok(())
    }

    async fn read_loop(&self, pkt_tx: mpsc::Sender<(Vec<u8>, SocketAddr)>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut buf = vec![0u8; MAX_PACKET_LEN];

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((n, addr)) => {
                        self.stats.packets.fetch_add(1, Ordering::Relaxed);
                        // The DHT is lossy by design; overflow drops the packet.
                        if pkt_tx.try_send((buf[..n].to_vec(), addr)).is_err() {
                            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "udp recv failed");
                    }
                }
            }
        }
    }

    async fn transaction_loop(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let mut tick = interval(TRANSACTION_SWEEP_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    let (retries, failed) = self.transactions.take_expired(self.config.tries);

                    for tx in retries {
                        let msg = KrpcMessage::query(
                            encode_tid(tx.tid),
                            self.source_id(tx.query.target_id()),
                            tx.query.clone(),
                        );
                        self.send_message(tx.node.addr, &msg).await;
                    }

                    for tx in failed {
                        self.routing.remove(&tx.node.id);
                        self.blacklist
                            .insert(tx.node.addr.ip(), Some(tx.node.addr.port()));
                    }
                }
            }
        }
    }

    async fn sweeper_loop(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let mut token_tick = interval(self.config.token_expired_after.max(Duration::from_secs(1)));
        let mut ban_tick = interval(Duration::from_secs(60));
        token_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ban_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        token_tick.tick().await;
        ban_tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = token_tick.tick() => self.tokens.sweep(),
                _ = ban_tick.tick() => self.blacklist.sweep(),
            }
        }
    }

    async fn stats_loop(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let mut tick = interval(STATS_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => self.log_stats(),
            }
        }
    }

    fn log_stats(&self) {
        let (connected, total) = {
            let boot = self.boot_status.lock();
            (boot.values().filter(|v| **v).count(), boot.len())
        };
        let boot = format!("{connected}/{total}");

        info!(
            nodes = self.routing.len(),
            boot = %boot,
            pending = self.transactions.len(),
            packets = self.stats.packets.load(Ordering::Relaxed),
            dropped = self.stats.dropped.load(Ordering::Relaxed),
            announces = self.stats.announces.load(Ordering::Relaxed),
            peers_found = self.stats.peers_found.load(Ordering::Relaxed),
            unique_peers = self.stats.unique_peers.lock().len(),
            info_hashes = self.peers.hash_count(),
            "dht stats"
        );
    }

    /// Sends `find_node(self)` to every resolvable prime node.
    async fn join(&self) {
        info!(count = self.config.prime_nodes.len(), "joining dht network");

        let lookups = self
            .config
            .prime_nodes
            .iter()
            .map(|host| async move { (host.clone(), lookup_host(host.as_str()).await) });

        for (host, result) in futures::future::join_all(lookups).await {
            let addrs = match result {
                Ok(addrs) => addrs,
                Err(e) => {
                    debug!(host = %host, error = %e, "prime node lookup failed");
                    continue;
                }
            };

            let Some(addr) = addrs.into_iter().find(|a| self.addr_matches_network(a)) else {
                continue;
            };

            self.boot_status.lock().entry(addr).or_insert(false);
            self.send_query(
                Node::new(NodeId::random(), addr),
                KrpcQuery::FindNode { target: self.id },
            )
            .await;
        }
    }

    fn addr_matches_network(&self, addr: &SocketAddr) -> bool {
        match self.config.network {
            Network::Udp4 => addr.is_ipv4(),
            Network::Udp6 => addr.is_ipv6(),
            Network::Udp => true,
        }
    }

    async fn refresh_buckets(&self) {
        let plan = self.routing.refresh_plan(self.config.refresh_node_num);
        if plan.is_empty() {
            return;
        }

        debug!(queries = plan.len(), "refreshing stale buckets");
        for (node, target) in plan {
            self.send_query(node, KrpcQuery::FindNode { target }).await;
        }
    }

    /// The ID outgoing traffic claims to be from. Crawl mode impersonates
    /// an ID adjacent to the queried key so remotes keep us close.
    fn source_id(&self, target: Option<NodeId>) -> NodeId {
        match (self.config.mode, target) {
            (DhtMode::Crawl, Some(target)) => self.id.impersonate(&target),
            _ => self.id,
        }
    }

    async fn send_query(&self, node: Node, query: KrpcQuery) {
        if node.addr.port() == 0 || self.blacklist.contains(node.addr.ip(), node.addr.port()) {
            return;
        }

        let tid = self.transactions.next_tid();
        let msg = KrpcMessage::query(
            encode_tid(tid),
            self.source_id(query.target_id()),
            query.clone(),
        );
        self.transactions.register(tid, node.clone(), query);
        self.send_message(node.addr, &msg).await;
    }

    async fn send_message(&self, addr: SocketAddr, msg: &KrpcMessage) {
        if let Err(e) = self.socket.send_to(&msg.encode(), addr).await {
            debug!(%addr, error = %e, "udp send failed");
        }
    }

    async fn handle_packet(&self, data: &[u8], addr: SocketAddr) {
        if data.len() < MIN_PACKET_LEN {
            return;
        }
        if self.blacklist.contains(addr.ip(), addr.port()) {
            return;
        }

        let msg = match KrpcMessage::parse(data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%addr, error = %e, "dropping malformed packet");
                return;
            }
        };

        self.record_boot_response(addr);

        match msg.body {
            KrpcBody::Query { sender, query } => {
                self.stats.queries.fetch_add(1, Ordering::Relaxed);
                self.routing.touch(sender, addr);
                self.handle_query(msg.transaction_id, addr, query).await;
            }
            KrpcBody::Response(body) => {
                self.stats.responses.fetch_add(1, Ordering::Relaxed);

                let Some(pending) = self.transactions.resolve(addr, &msg.transaction_id) else {
                    // Spoofed or stale: tx ids only resolve from the queried
                    // address.
                    debug!(%addr, "response without matching (addr, txid) transaction");
                    return;
                };

                if let Some(id) = body.id {
                    self.routing.touch(id, addr);
                }

                self.handle_response(pending.query, body).await;
            }
            KrpcBody::Error { code, message } => {
                let _ = self.transactions.resolve(addr, &msg.transaction_id);
                debug!(%addr, code, message, "krpc error from remote");
            }
        }
    }

    async fn handle_query(&self, tid: Bytes, addr: SocketAddr, query: KrpcQuery) {
        let reply = match query {
            KrpcQuery::Ping => KrpcResponseBody {
                id: Some(self.id),
                ..Default::default()
            },
            KrpcQuery::FindNode { target } => KrpcResponseBody {
                id: Some(self.source_id(Some(target))),
                nodes: self.routing.neighbors(&target, self.config.k),
                ..Default::default()
            },
            KrpcQuery::GetPeers { info_hash } => {
                self.emit(DhtEvent::GetPeers {
                    info_hash,
                    from: addr,
                });

                let token = self.tokens.issue(addr.ip());
                let peers = self.peers.get(&info_hash, self.config.k);
                let target = NodeId(info_hash);
                let nodes = if peers.is_empty() {
                    self.routing.neighbors(&target, self.config.k)
                } else {
                    Vec::new()
                };

                KrpcResponseBody {
                    id: Some(self.source_id(Some(target))),
                    nodes,
                    peers,
                    token: Some(token),
                }
            }
            KrpcQuery::AnnouncePeer {
                info_hash,
                port,
                token,
                implied_port,
            } => {
                // Crawl mode accepts any token; the info-hash is the harvest.
                if self.config.mode == DhtMode::Standard
                    && !self.tokens.verify(addr.ip(), &token)
                {
                    debug!(%addr, "announce_peer with invalid token");
                    self.send_message(addr, &KrpcMessage::error(tid, ERR_PROTOCOL, "invalid token"))
                        .await;
                    return;
                }

                let peer_port = if implied_port { addr.port() } else { port };
                let peer = SocketAddr::new(addr.ip(), peer_port);
                self.peers.insert(info_hash, peer);
                self.stats.announces.fetch_add(1, Ordering::Relaxed);
                self.emit(DhtEvent::AnnouncePeer { info_hash, peer });

                KrpcResponseBody {
                    id: Some(self.source_id(Some(NodeId(info_hash)))),
                    ..Default::default()
                }
            }
        };

        self.send_message(addr, &KrpcMessage::response(tid, reply)).await;
    }

    async fn handle_response(&self, query: KrpcQuery, body: KrpcResponseBody) {
        for node in &body.nodes {
            self.routing.insert(node.clone());
        }

        if let KrpcQuery::GetPeers { info_hash } = query {
            // Peers surface to the consumer before any follow-up queries
            // go out for the nodes carried in the same response.
            for peer in &body.peers {
                self.stats.peers_found.fetch_add(1, Ordering::Relaxed);
                self.stats.track_peer(*peer);
                self.emit(DhtEvent::PeersFound {
                    info_hash,
                    peer: *peer,
                });
            }

            if self.transactions.len() < MAX_PENDING_QUERIES {
                for node in body.nodes {
                    self.send_query(node, KrpcQuery::GetPeers { info_hash }).await;
                }
            }
        }
    }

    fn record_boot_response(&self, addr: SocketAddr) {
        let mut boot = self.boot_status.lock();
        if let Some(connected) = boot.get_mut(&addr) {
            if !*connected {
                *connected = true;
                info!(%addr, "prime node responded");
            }
        }
    }

    fn emit(&self, event: DhtEvent) {
        let events = self.events.read();
        if let Some(tx) = events.as_ref() {
            if tx.try_send(event).is_err() {
                // Slow consumer or gone; events are lossy like the DHT.
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn parse_listen_addr(address: &str, network: Network) -> Result<SocketAddr, DhtError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| DhtError::InvalidAddress(address.to_string()))?;

    let port: u16 = port
        .parse()
        .map_err(|_| DhtError::InvalidAddress(address.to_string()))?;

    let ip: IpAddr = if host.is_empty() {
        match network {
            Network::Udp6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    } else {
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| DhtError::InvalidAddress(address.to_string()))?
    };

    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod addr_tests {
    use super::*;

    #[test]
    fn parses_bare_port() {
        let addr = parse_listen_addr(":26881", Network::Udp4).unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:26881");
    }

    #[test]
    fn parses_host_and_port() {
        let addr = parse_listen_addr("127.0.0.1:6881", Network::Udp4).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:6881");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_listen_addr("no-port", Network::Udp4).is_err());
        assert!(parse_listen_addr("host:notaport", Network::Udp4).is_err());
    }
}

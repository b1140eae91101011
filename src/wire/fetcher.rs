use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use rand::Rng as _;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::session;
use crate::constants::{
    CLIENT_PREFIX, DOWNLOAD_BUFFER_SIZE, FETCH_CONCURRENCY, FETCH_DEDUP_WINDOW,
    FETCH_QUEUE_LIMIT, PEERS_PER_INFOHASH, PEER_BAN_WINDOW,
};

/// A fetch work item: who announced which torrent.
#[derive(Debug, Clone, Copy)]
struct FetchRequest {
    info_hash: [u8; 20],
    peer: SocketAddr,
}

/// A successfully fetched and verified `info` dictionary.
#[derive(Debug, Clone)]
pub struct FetchedMetadata {
    pub info_hash: [u8; 20],
    /// Raw canonical bencoding of the `info` dictionary; its SHA-1 equals
    /// `info_hash`.
    pub info: Bytes,
    pub peer: SocketAddr,
}

/// Schedules metadata fetch sessions.
///
/// Requests stream in from the engine's `announce_peer` events via
/// [`MetadataFetcher::request`]; verified metadata streams out on the
/// channel returned by [`MetadataFetcher::new`]. Admission control:
///
/// - at most `concurrency` sessions run at once,
/// - at most `per_hash_limit` of them per info-hash,
/// - a `(info-hash, peer)` pair is dialed at most once per dedup window,
/// - peers that misbehaved recently are skipped.
pub struct MetadataFetcher {
    buffer_cap: usize,
    per_hash_limit: usize,
    peer_id: [u8; 20],
    req_tx: mpsc::Sender<FetchRequest>,
    req_rx: tokio::sync::Mutex<Option<mpsc::Receiver<FetchRequest>>>,
    resp_tx: mpsc::Sender<FetchedMetadata>,
    sessions: Arc<Semaphore>,
    active_per_hash: DashMap<[u8; 20], usize>,
    recent: DashMap<([u8; 20], SocketAddr), Instant>,
    banned: DashMap<SocketAddr, Instant>,
    shutdown: watch::Sender<bool>,
}

impl MetadataFetcher {
    /// Creates a fetcher and the stream its results arrive on.
    pub fn new(
        buffer_cap: usize,
        per_hash_limit: usize,
        concurrency: usize,
    ) -> (Arc<Self>, mpsc::Receiver<FetchedMetadata>) {
        let (req_tx, req_rx) = mpsc::channel(FETCH_QUEUE_LIMIT);
        let (resp_tx, resp_rx) = mpsc::channel(FETCH_QUEUE_LIMIT);
        let (shutdown, _) = watch::channel(false);

        let fetcher = Arc::new(Self {
            buffer_cap: buffer_cap.max(1024),
            per_hash_limit: per_hash_limit.max(1),
            peer_id: generate_peer_id(),
            req_tx,
            req_rx: tokio::sync::Mutex::new(Some(req_rx)),
            resp_tx,
            sessions: Arc::new(Semaphore::new(concurrency.max(1))),
            active_per_hash: DashMap::new(),
            recent: DashMap::new(),
            banned: DashMap::new(),
            shutdown,
        });

        (fetcher, resp_rx)
    }

    /// Fetcher with the stock buffer/peer/concurrency limits.
    pub fn with_defaults() -> (Arc<Self>, mpsc::Receiver<FetchedMetadata>) {
        Self::new(DOWNLOAD_BUFFER_SIZE, PEERS_PER_INFOHASH, FETCH_CONCURRENCY)
    }

    /// Queues a fetch. Non-blocking; the request is dropped when the queue
    /// is full (the DHT will surface the hash again).
    pub fn request(&self, info_hash: [u8; 20], peer: SocketAddr) {
        if peer.port() == 0 {
            return;
        }
        let _ = self.req_tx.try_send(FetchRequest { info_hash, peer });
    }

    /// Drains the request queue until [`MetadataFetcher::stop`].
    pub async fn run(self: Arc<Self>) {
        let Some(mut req_rx) = self.req_rx.lock().await.take() else {
            return;
        };

        let mut shutdown = self.shutdown.subscribe();
        let mut gc = interval(FETCH_DEDUP_WINDOW);
        gc.set_missed_tick_behavior(MissedTickBehavior::Skip);
        gc.tick().await;

        info!("metadata fetcher running");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = gc.tick() => self.collect_garbage(),
                request = req_rx.recv() => {
                    let Some(request) = request else { break };
                    self.admit(request).await;
                }
            }
        }

        info!("metadata fetcher stopped");
    }

    /// Signals the scheduler to wind down.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn admit(self: &Arc<Self>, request: FetchRequest) {
        let key = (request.info_hash, request.peer);

        if let Some(at) = self.banned.get(&request.peer) {
            if at.elapsed() <= PEER_BAN_WINDOW {
                return;
            }
        }
        if let Some(at) = self.recent.get(&key) {
            if at.elapsed() <= FETCH_DEDUP_WINDOW {
                return;
            }
        }

        {
            let mut active = self.active_per_hash.entry(request.info_hash).or_insert(0);
            if *active >= self.per_hash_limit {
                return;
            }
            *active += 1;
        }

        self.recent.insert(key, Instant::now());

        let Ok(permit) = self.sessions.clone().acquire_owned().await else {
            self.session_done(&request.info_hash);
            return;
        };

        let this = self.clone();
        tokio::spawn(async move {
            let result = session::fetch(
                request.peer,
                request.info_hash,
                this.peer_id,
                this.buffer_cap,
            )
            .await;

            match result {
                Ok(info) => {
                    debug!(
                        info_hash = %hex::encode(request.info_hash),
                        peer = %request.peer,
                        bytes = info.len(),
                        "metadata fetched"
                    );
                    let _ = this
                        .resp_tx
                        .send(FetchedMetadata {
                            info_hash: request.info_hash,
                            info,
                            peer: request.peer,
                        })
                        .await;
                }
                Err(e) => {
                    debug!(
                        info_hash = %hex::encode(request.info_hash),
                        peer = %request.peer,
                        error = %e,
                        "metadata fetch failed"
                    );
                    if e.is_peer_fault() {
                        this.banned.insert(request.peer, Instant::now());
                    }
                }
            }

            this.session_done(&request.info_hash);
            drop(permit);
        });
    }

    fn session_done(&self, info_hash: &[u8; 20]) {
        if let Some(mut active) = self.active_per_hash.get_mut(info_hash) {
            *active = active.saturating_sub(1);
        }
        self.active_per_hash
            .remove_if(info_hash, |_, active| *active == 0);
    }

    fn collect_garbage(&self) {
        self.recent.retain(|_, at| at.elapsed() <= FETCH_DEDUP_WINDOW);
        self.banned.retain(|_, at| at.elapsed() <= PEER_BAN_WINDOW);
    }
}

/// Azureus-style peer id: client prefix plus random alphanumerics.
fn generate_peer_id() -> [u8; 20] {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut id = [0u8; 20];
    id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX.as_bytes());

    let mut rng = rand::rng();
    for byte in id[CLIENT_PREFIX.len()..].iter_mut() {
        *byte = ALPHABET[rng.random_range(0..ALPHABET.len())];
    }
    id
}

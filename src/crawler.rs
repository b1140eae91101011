//! Top-level crawler: wires the DHT engine, the metadata fetcher and the
//! ingest pipeline together.
//!
//! The flow is one straight line: `announce_peer` events from the engine
//! become fetch requests, verified metadata from the fetcher runs through
//! ingest, matches land in the store. The crawler also owns the keyword
//! policy (seeded with a default set) and the operator-facing daily log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::constants::{DOWNLOAD_BUFFER_SIZE, PEERS_PER_INFOHASH};
use crate::dht::{Dht, DhtConfig, DhtError, DhtEvent};
use crate::filter::KeywordFilter;
use crate::ingest::{Ingest, IngestError};
use crate::logger::{DailyLogger, LoggerError};
use crate::store::Store;
use crate::wire::{FetchedMetadata, MetadataFetcher};

/// Errors that prevent the crawler from starting.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("dht error: {0}")]
    Dht(#[from] DhtError),

    #[error("logger error: {0}")]
    Logger(#[from] LoggerError),
}

/// The assembled crawler. Create, [`start`](Crawler::start), and
/// [`stop`](Crawler::stop) on shutdown.
pub struct Crawler {
    dht: Arc<Dht>,
    fetcher: Arc<MetadataFetcher>,
    filter: Arc<KeywordFilter>,
    ingest: Arc<Ingest>,
    logger: Arc<DailyLogger>,
    metadata_rx: Mutex<Option<mpsc::Receiver<FetchedMetadata>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Crawler {
    /// Builds a crawl-mode engine listening on `listen_addr` (`:26881`
    /// style addresses accepted) with `concurrency` parallel metadata
    /// fetch sessions.
    pub async fn new(
        store: Arc<dyn Store>,
        listen_addr: &str,
        concurrency: usize,
    ) -> Result<Self, CrawlerError> {
        let logger = Arc::new(DailyLogger::new("logs")?);

        let filter = Arc::new(KeywordFilter::new());
        seed_default_keywords(&filter);

        let (fetcher, metadata_rx) =
            MetadataFetcher::new(DOWNLOAD_BUFFER_SIZE, PEERS_PER_INFOHASH, concurrency);

        let mut config = DhtConfig::crawl();
        config.address = listen_addr.to_string();
        config.check_k_bucket_period = Duration::from_secs(30);
        config.nat = true;

        let dht = Dht::bind(config).await?;
        let ingest = Arc::new(Ingest::new(store, filter.clone(), logger.clone()));

        logger.info("crawler created");

        Ok(Self {
            dht,
            fetcher,
            filter,
            ingest,
            logger,
            metadata_rx: Mutex::new(Some(metadata_rx)),
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }

    /// Spawns the engine, the fetch scheduler, the event bridge and the
    /// ingest loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut tasks = self.tasks.lock();

        // announce_peer events → fetch requests
        let mut events = self.dht.subscribe();
        let fetcher = self.fetcher.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    DhtEvent::AnnouncePeer { info_hash, peer } => {
                        fetcher.request(info_hash, peer);
                    }
                    DhtEvent::PeersFound { info_hash, peer } => {
                        // Peers learned from get_peers walks are fetchable too.
                        fetcher.request(info_hash, peer);
                    }
                    DhtEvent::GetPeers { info_hash, from } => {
                        debug!(
                            info_hash = %hex::encode(info_hash),
                            %from,
                            "get_peers observed"
                        );
                    }
                }
            }
        }));

        // fetched metadata → ingest
        if let Some(mut metadata_rx) = self.metadata_rx.lock().take() {
            let ingest = self.ingest.clone();
            let logger = self.logger.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(fetched) = metadata_rx.recv().await {
                    match ingest.process(&fetched) {
                        Ok(outcome) => {
                            debug!(?outcome, info_hash = %hex::encode(fetched.info_hash), "ingested");
                        }
                        Err(IngestError::Store(e)) => {
                            // Fire-and-forget: the DHT will surface the hash again.
                            logger.error(&format!("store error, dropping item: {e}"));
                        }
                        Err(e) => {
                            debug!(error = %e, "unusable metadata dropped");
                        }
                    }
                }
            }));
        }

        let fetcher = self.fetcher.clone();
        tasks.push(tokio::spawn(async move { fetcher.run().await }));

        let dht = self.dht.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = dht.run().await {
                tracing::error!(error = %e, "dht engine exited");
            }
        }));

        self.logger.info("crawler started");
        info!("crawler started");
    }

    /// Graceful shutdown: engine first (closes the event stream), then the
    /// fetcher, then the bridge tasks.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.dht.stop().await;
        self.fetcher.stop();

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        self.logger.info("crawler stopped");
        info!("crawler stopped");
    }

    pub fn add_keyword(&self, keyword: &str, category: &str) {
        self.filter.add_keyword(keyword, category);
        self.logger
            .info(&format!("keyword added: {keyword} [{category}]"));
    }

    pub fn remove_keyword(&self, keyword: &str) {
        self.filter.remove_keyword(keyword);
        self.logger.info(&format!("keyword removed: {keyword}"));
    }

    pub fn add_blacklist_keyword(&self, keyword: &str) {
        self.filter.add_blacklisted(keyword);
        self.logger
            .info(&format!("blacklist keyword added: {keyword}"));
    }

    pub fn remove_blacklist_keyword(&self, keyword: &str) {
        self.filter.remove_blacklisted(keyword);
        self.logger
            .info(&format!("blacklist keyword removed: {keyword}"));
    }

    pub fn keywords(&self) -> Vec<String> {
        self.filter.keywords()
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.filter.blacklist()
    }

    pub fn keyword_category(&self, keyword: &str) -> Option<String> {
        self.filter.category(keyword)
    }
}

/// The stock keyword policy a fresh crawler watches for.
fn seed_default_keywords(filter: &KeywordFilter) {
    filter.add_keywords(
        &["movie", "film", "bluray", "bdrip", "1080p", "720p", "4k", "uhd"],
        "Movie",
    );
    filter.add_keywords(
        &["tv series", "season", "episode", "s01", "s02", "e01", "e02"],
        "TV",
    );
    filter.add_keywords(&["anime", "animation", "cartoon", "animated"], "Anime");
    filter.add_keywords(
        &["ost", "soundtrack", "album", "discography", "concert", "music", "mp3", "flac"],
        "Music",
    );
    filter.add_keywords(
        &["software", "application", "windows", "macos", "linux", "android", "ios"],
        "Software",
    );
    filter.add_keywords(
        &["game", "pc game", "xbox", "playstation", "ps4", "ps5", "nintendo", "switch"],
        "Game",
    );
    filter.add_keywords(
        &["ebook", "pdf", "epub", "mobi", "azw3", "textbook", "book"],
        "Ebook",
    );

    filter.add_blacklist(&["child", "teen", "underage"]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_seeded() {
        let filter = KeywordFilter::new();
        seed_default_keywords(&filter);

        assert_eq!(filter.matches("Some.Movie.2024.1080p"), Some("movie".to_string()));
        assert_eq!(filter.category("movie"), Some("Movie".to_string()));
        assert_eq!(filter.category("flac"), Some("Music".to_string()));
        // Safety blacklist beats any keyword.
        assert_eq!(filter.matches("teen movie 1080p"), None);
    }
}

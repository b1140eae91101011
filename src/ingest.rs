//! Ingest pipeline: fetched metadata → filtered, categorized store records.
//!
//! Consumes [`FetchedMetadata`](crate::wire::FetchedMetadata) items, drops
//! what the keyword policy rejects, dedups by info-hash (re-discoveries
//! bump heat), resolves a category, composes the magnet URI and writes the
//! record. Store failures are logged and the item dropped; the DHT will
//! surface the same info-hash again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::filter::KeywordFilter;
use crate::logger::DailyLogger;
use crate::metainfo::{InfoHash, MagnetLink, MetainfoError, TorrentInfo};
use crate::store::{RecordFile, Store, StoreError, TorrentRecord};
use crate::wire::FetchedMetadata;

const GIB: i64 = 1024 * 1024 * 1024;

/// Errors that drop an ingest item.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Metadata did not parse (or carried no name).
    #[error("metadata error: {0}")]
    Metainfo(#[from] MetainfoError),

    /// The store rejected the operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// What happened to one ingest item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New record written.
    Inserted,
    /// Already known; heat bumped.
    HeatBumped,
    /// Name did not pass the keyword policy.
    FilteredOut,
}

/// The pipeline stage between the wire and the store.
pub struct Ingest {
    store: Arc<dyn Store>,
    filter: Arc<KeywordFilter>,
    logger: Arc<DailyLogger>,
}

impl Ingest {
    pub fn new(store: Arc<dyn Store>, filter: Arc<KeywordFilter>, logger: Arc<DailyLogger>) -> Self {
        Self {
            store,
            filter,
            logger,
        }
    }

    /// Runs one fetched metadata blob through the pipeline.
    pub fn process(&self, fetched: &FetchedMetadata) -> Result<IngestOutcome, IngestError> {
        let info = TorrentInfo::from_info_bytes(&fetched.info)?;
        let hash_hex = hex::encode(fetched.info_hash);

        if self.store.exists(&hash_hex)? {
            self.store.increment_heat(&hash_hex)?;
            debug!(info_hash = %hash_hex, "re-discovered, heat bumped");
            return Ok(IngestOutcome::HeatBumped);
        }

        let Some(keyword) = self.filter.matches(&info.name) else {
            debug!(name = %info.name, "filtered out");
            return Ok(IngestOutcome::FilteredOut);
        };

        let category = self
            .filter
            .category(&keyword)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| {
                categorize(&info.name, info.file_count(), info.total_size).to_string()
            });

        let record = build_record(fetched.info_hash, &info, category);
        self.store.insert(&record)?;

        self.logger.info(&format!(
            "stored {} [{}] keyword={} category={}",
            record.title, record.info_hash, keyword, record.category
        ));

        Ok(IngestOutcome::Inserted)
    }
}

/// Shapes a parsed info dictionary into the persistent record.
fn build_record(info_hash: [u8; 20], info: &TorrentInfo, category: String) -> TorrentRecord {
    let hash = InfoHash::from_raw(info_hash);

    let mut magnet = MagnetLink::new(hash);
    if let Some(announce) = &info.announce {
        magnet = magnet.with_tracker(announce.clone());
    }
    magnet = magnet.with_display_name(info.name.clone());

    let upload_date = info
        .creation_date
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    let files = info
        .files
        .iter()
        .map(|f| RecordFile {
            path: f.path.join("/"),
            length: f.length,
        })
        .collect();

    TorrentRecord {
        title: info.name.clone(),
        info_hash: hash.to_hex(),
        magnet_link: magnet.to_uri(),
        size: info.total_size,
        file_count: info.file_count(),
        category,
        upload_date,
        description: info.comment.clone().unwrap_or_default(),
        source: "DHT".to_string(),
        heat: 1,
        files,
    }
}

const VIDEO_EXTS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".ts", ".m4v", ".3gp",
];
const AUDIO_EXTS: &[&str] = &[".mp3", ".flac", ".aac", ".wav", ".wma", ".m4a", ".ogg"];
const IMAGE_EXTS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff"];
const DOC_EXTS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".epub",
];
const ARCHIVE_EXTS: &[&str] = &[".zip", ".rar", ".7z", ".tar", ".gz", ".iso"];

const CATEGORY_WORDS: &[(&str, &[&str])] = &[
    (
        "Movie",
        &["movie", "film", "bluray", "bdrip", "dvdrip", "1080p", "720p", "4k"],
    ),
    (
        "TV",
        &["series", "season", "episode", "s01", "s02", "e01", "e02"],
    ),
    (
        "Music",
        &["album", "discography", "soundtrack", "ost", "music"],
    ),
    ("Game", &["game", "xbox", "ps4", "ps5", "nintendo", "switch"]),
    ("Software", &["software", "app", "windows", "macos", "linux"]),
    ("Anime", &["anime", "cartoon", "animation"]),
    ("Ebook", &["ebook", "books", "novel", "comics", "manga"]),
];

/// Deterministic classifier for names whose keyword has no explicit
/// category: file-extension tables, then keyword tables, then size/count
/// heuristics.
pub fn categorize(name: &str, file_count: usize, size: i64) -> &'static str {
    let lower = name.to_lowercase();

    if VIDEO_EXTS.iter().any(|ext| lower.ends_with(ext)) {
        return if size > GIB { "Movie" } else { "Video" };
    }
    if AUDIO_EXTS.iter().any(|ext| lower.ends_with(ext)) {
        return "Music";
    }
    if IMAGE_EXTS.iter().any(|ext| lower.ends_with(ext)) {
        return "Image";
    }
    if DOC_EXTS.iter().any(|ext| lower.ends_with(ext)) {
        return "Document";
    }
    if ARCHIVE_EXTS.iter().any(|ext| lower.ends_with(ext)) {
        return "Archive";
    }

    for (category, words) in CATEGORY_WORDS {
        if words.iter().any(|w| lower.contains(w)) {
            return category;
        }
    }

    if file_count > 50 && size > 10 * GIB {
        "Collection"
    } else if size > 4 * GIB {
        "Movie"
    } else {
        "Unknown"
    }
}

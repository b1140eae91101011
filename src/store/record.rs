use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored torrent, keyed uniquely by `info_hash` (lowercase hex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorrentRecord {
    pub title: String,
    pub info_hash: String,
    pub magnet_link: String,
    pub size: i64,
    pub file_count: usize,
    pub category: String,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    pub source: String,
    /// Bumped on every re-discovery of the same info-hash.
    pub heat: u64,
    #[serde(default)]
    pub files: Vec<RecordFile>,
}

/// One file inside a stored torrent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordFile {
    pub path: String,
    pub length: i64,
}

/// Sort order for [`TorrentQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    UploadDate,
    Heat,
    Size,
}

/// A query against the store.
#[derive(Debug, Clone, Default)]
pub struct TorrentQuery {
    /// Substring match on title or description; `None` matches all.
    pub text: Option<String>,
    /// Exact category filter.
    pub category: Option<String>,
    pub sort: SortKey,
    /// `true` for descending (the usual listing order).
    pub descending: bool,
    pub skip: usize,
    /// Zero means unlimited.
    pub limit: usize,
}

/// One row of the category aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

impl TorrentQuery {
    /// Whether a record satisfies the filter part of the query.
    pub fn matches(&self, record: &TorrentRecord) -> bool {
        if let Some(category) = &self.category {
            if &record.category != category {
                return false;
            }
        }

        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = record.title.to_lowercase().contains(&needle)
                || record.description.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        true
    }

    /// Sorts, skips and limits a result set in place.
    pub fn shape(&self, records: &mut Vec<TorrentRecord>) {
        records.sort_by(|a, b| {
            let ord = match self.sort {
                SortKey::UploadDate => a.upload_date.cmp(&b.upload_date),
                SortKey::Heat => a.heat.cmp(&b.heat),
                SortKey::Size => a.size.cmp(&b.size),
            };
            if self.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        if self.skip > 0 {
            records.drain(..self.skip.min(records.len()));
        }
        if self.limit > 0 {
            records.truncate(self.limit);
        }
    }
}

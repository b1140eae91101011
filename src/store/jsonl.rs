use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::memory::MemoryStore;
use super::record::{CategoryCount, TorrentQuery, TorrentRecord};
use super::{Store, StoreError};

/// One journal line.
#[derive(Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Insert { record: TorrentRecord },
    Heat { info_hash: String },
}

/// Append-only JSON-lines store adapter.
///
/// Every mutation appends one journal line; opening replays the journal
/// into an in-memory index, which then serves all reads. Suits a
/// single-node crawler; a multi-node deployment should implement [`Store`]
/// against a real document database instead.
pub struct JsonlStore {
    index: MemoryStore,
    journal: Mutex<File>,
}

impl JsonlStore {
    /// Opens (or creates) a journal file and replays it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        let index = MemoryStore::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalEntry>(&line)? {
                    JournalEntry::Insert { record } => index.insert(&record)?,
                    JournalEntry::Heat { info_hash } => index.increment_heat(&info_hash)?,
                }
            }
        }

        let journal = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            index,
            journal: Mutex::new(journal),
        })
    }

    fn append(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut journal = self.journal.lock();
        journal.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Store for JsonlStore {
    fn exists(&self, info_hash_hex: &str) -> Result<bool, StoreError> {
        self.index.exists(info_hash_hex)
    }

    fn increment_heat(&self, info_hash_hex: &str) -> Result<(), StoreError> {
        self.append(&JournalEntry::Heat {
            info_hash: info_hash_hex.to_string(),
        })?;
        self.index.increment_heat(info_hash_hex)
    }

    fn insert(&self, record: &TorrentRecord) -> Result<(), StoreError> {
        self.append(&JournalEntry::Insert {
            record: record.clone(),
        })?;
        self.index.insert(record)
    }

    fn count_by_filter(&self, query: &TorrentQuery) -> Result<usize, StoreError> {
        self.index.count_by_filter(query)
    }

    fn find(&self, query: &TorrentQuery) -> Result<Vec<TorrentRecord>, StoreError> {
        self.index.find(query)
    }

    fn aggregate_categories(&self) -> Result<Vec<CategoryCount>, StoreError> {
        self.index.aggregate_categories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(hash: &str, category: &str) -> TorrentRecord {
        TorrentRecord {
            title: format!("torrent {hash}"),
            info_hash: hash.to_string(),
            magnet_link: format!("magnet:?xt=urn:btih:{hash}"),
            size: 1024,
            file_count: 1,
            category: category.to_string(),
            upload_date: Utc::now(),
            description: String::new(),
            source: "DHT".to_string(),
            heat: 1,
            files: Vec::new(),
        }
    }

    #[test]
    fn journal_replays_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torrents.jsonl");

        {
            let store = JsonlStore::open(&path).unwrap();
            store.insert(&record("aa", "Movie")).unwrap();
            store.insert(&record("bb", "Music")).unwrap();
            store.increment_heat("aa").unwrap();
        }

        let store = JsonlStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.exists("aa").unwrap());

        let heats: Vec<u64> = store
            .find(&TorrentQuery::default())
            .unwrap()
            .into_iter()
            .filter(|r| r.info_hash == "aa")
            .map(|r| r.heat)
            .collect();
        assert_eq!(heats, vec![2]);
    }

    #[test]
    fn duplicate_insert_becomes_heat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torrents.jsonl");

        let store = JsonlStore::open(&path).unwrap();
        store.insert(&record("cc", "Movie")).unwrap();
        store.insert(&record("cc", "Movie")).unwrap();

        assert_eq!(store.len(), 1);
        let all = store.find(&TorrentQuery::default()).unwrap();
        assert_eq!(all[0].heat, 2);
    }
}

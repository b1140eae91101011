use std::collections::HashMap;

use parking_lot::RwLock;

use super::record::{CategoryCount, TorrentQuery, TorrentRecord};
use super::{Store, StoreError};

/// In-memory store adapter: a map keyed by info-hash hex.
///
/// Used by tests and `--db mem://` dry runs. Not durable.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, TorrentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetches one record by info-hash hex.
    pub fn get(&self, info_hash_hex: &str) -> Option<TorrentRecord> {
        self.records.read().get(info_hash_hex).cloned()
    }
}

impl Store for MemoryStore {
    fn exists(&self, info_hash_hex: &str) -> Result<bool, StoreError> {
        Ok(self.records.read().contains_key(info_hash_hex))
    }

    fn increment_heat(&self, info_hash_hex: &str) -> Result<(), StoreError> {
        if let Some(record) = self.records.write().get_mut(info_hash_hex) {
            record.heat += 1;
        }
        Ok(())
    }

    fn insert(&self, record: &TorrentRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if let Some(existing) = records.get_mut(&record.info_hash) {
            // Unique index on info_hash: a second insert is a re-discovery.
            existing.heat += 1;
        } else {
            records.insert(record.info_hash.clone(), record.clone());
        }
        Ok(())
    }

    fn count_by_filter(&self, query: &TorrentQuery) -> Result<usize, StoreError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| query.matches(r))
            .count())
    }

    fn find(&self, query: &TorrentQuery) -> Result<Vec<TorrentRecord>, StoreError> {
        let mut out: Vec<TorrentRecord> = self
            .records
            .read()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        query.shape(&mut out);
        Ok(out)
    }

    fn aggregate_categories(&self) -> Result<Vec<CategoryCount>, StoreError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.records.read().values() {
            *counts.entry(record.category.clone()).or_default() += 1;
        }

        let mut out: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::record::SortKey;
    use super::*;
    use chrono::{Duration, Utc};

    fn record(hash: &str, category: &str, heat: u64, age_days: i64) -> TorrentRecord {
        TorrentRecord {
            title: format!("title {hash}"),
            info_hash: hash.to_string(),
            magnet_link: format!("magnet:?xt=urn:btih:{hash}"),
            size: 4096,
            file_count: 1,
            category: category.to_string(),
            upload_date: Utc::now() - Duration::days(age_days),
            description: "desc".to_string(),
            source: "DHT".to_string(),
            heat,
            files: Vec::new(),
        }
    }

    #[test]
    fn unique_key_on_info_hash() {
        let store = MemoryStore::new();
        store.insert(&record("aa", "Movie", 1, 0)).unwrap();
        store.insert(&record("aa", "Movie", 1, 0)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("aa").unwrap().heat, 2);
    }

    #[test]
    fn heat_increments() {
        let store = MemoryStore::new();
        store.insert(&record("aa", "Movie", 1, 0)).unwrap();
        store.increment_heat("aa").unwrap();
        store.increment_heat("missing").unwrap(); // no-op

        assert_eq!(store.get("aa").unwrap().heat, 2);
    }

    #[test]
    fn find_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        store.insert(&record("aa", "Movie", 5, 3)).unwrap();
        store.insert(&record("bb", "Movie", 9, 2)).unwrap();
        store.insert(&record("cc", "Music", 1, 1)).unwrap();

        let query = TorrentQuery {
            category: Some("Movie".to_string()),
            sort: SortKey::Heat,
            descending: true,
            limit: 1,
            ..Default::default()
        };

        let found = store.find(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].info_hash, "bb");
        assert_eq!(store.count_by_filter(&query).unwrap(), 2);
    }

    #[test]
    fn text_query_matches_title_and_description() {
        let store = MemoryStore::new();
        store.insert(&record("aa", "Movie", 1, 0)).unwrap();

        let hit = TorrentQuery {
            text: Some("TITLE AA".to_string()),
            ..Default::default()
        };
        let miss = TorrentQuery {
            text: Some("nothing".to_string()),
            ..Default::default()
        };

        assert_eq!(store.count_by_filter(&hit).unwrap(), 1);
        assert_eq!(store.count_by_filter(&miss).unwrap(), 0);
    }

    #[test]
    fn categories_aggregate_descending() {
        let store = MemoryStore::new();
        store.insert(&record("aa", "Movie", 1, 0)).unwrap();
        store.insert(&record("bb", "Movie", 1, 0)).unwrap();
        store.insert(&record("cc", "Music", 1, 0)).unwrap();

        let categories = store.aggregate_categories().unwrap();
        assert_eq!(
            categories,
            vec![
                CategoryCount {
                    category: "Movie".to_string(),
                    count: 2
                },
                CategoryCount {
                    category: "Music".to_string(),
                    count: 1
                },
            ]
        );
    }
}

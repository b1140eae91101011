//! Operator-maintained keyword policy.
//!
//! A torrent name passes the filter when it contains at least one watched
//! keyword and no blacklisted substring. Keywords map to categories for the
//! ingest pipeline. Reads vastly outnumber mutations, so the state sits
//! behind a readers-writer lock; the O(n) list scans are fine for the few
//! hundred entries an operator realistically maintains.

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct FilterState {
    keywords: Vec<String>,
    blacklist: Vec<String>,
    categories: HashMap<String, String>,
}

/// Keyword/blacklist matcher with per-keyword categories.
///
/// # Examples
///
/// ```
/// use btspider::filter::KeywordFilter;
///
/// let filter = KeywordFilter::new();
/// filter.add_keyword("linux", "Software");
///
/// assert_eq!(filter.matches("Arch-Linux-2024.iso"), Some("linux".to_string()));
/// assert_eq!(filter.matches("cat pictures"), None);
/// assert_eq!(filter.category("linux"), Some("Software".to_string()));
/// ```
#[derive(Default)]
pub struct KeywordFilter {
    state: RwLock<FilterState>,
}

impl KeywordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a watched keyword with an optional category (empty = none).
    /// Keywords are matched case-insensitively; duplicates are ignored.
    pub fn add_keyword(&self, keyword: &str, category: &str) {
        let keyword = keyword.to_lowercase();
        let mut state = self.state.write();

        if !state.keywords.contains(&keyword) {
            if !category.is_empty() {
                state.categories.insert(keyword.clone(), category.to_string());
            }
            state.keywords.push(keyword);
        }
    }

    /// Adds a batch of keywords sharing one category.
    pub fn add_keywords(&self, keywords: &[&str], category: &str) {
        for keyword in keywords {
            self.add_keyword(keyword, category);
        }
    }

    pub fn remove_keyword(&self, keyword: &str) {
        let keyword = keyword.to_lowercase();
        let mut state = self.state.write();
        state.keywords.retain(|k| k != &keyword);
        state.categories.remove(&keyword);
    }

    /// Adds a blacklisted substring; any name containing it is dropped.
    pub fn add_blacklisted(&self, keyword: &str) {
        let keyword = keyword.to_lowercase();
        let mut state = self.state.write();
        if !state.blacklist.contains(&keyword) {
            state.blacklist.push(keyword);
        }
    }

    pub fn add_blacklist(&self, keywords: &[&str]) {
        for keyword in keywords {
            self.add_blacklisted(keyword);
        }
    }

    pub fn remove_blacklisted(&self, keyword: &str) {
        let keyword = keyword.to_lowercase();
        self.state.write().blacklist.retain(|k| k != &keyword);
    }

    /// Tests a name against the policy. Blacklist wins over keywords; the
    /// first matching keyword (insertion order) is returned.
    pub fn matches(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }

        let lower = name.to_lowercase();
        let state = self.state.read();

        if state.blacklist.iter().any(|b| lower.contains(b.as_str())) {
            return None;
        }

        state
            .keywords
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .cloned()
    }

    /// Category assigned to a keyword, if any.
    pub fn category(&self, keyword: &str) -> Option<String> {
        self.state
            .read()
            .categories
            .get(&keyword.to_lowercase())
            .cloned()
    }

    pub fn keywords(&self) -> Vec<String> {
        self.state.read().keywords.clone()
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.state.read().blacklist.clone()
    }
}

//! History snapshot cache
//!
//! A bounded, most-recent-last list of page snapshots persisted as one
//! JSON document through the Storage seam. Saving an already-cached URL
//! refreshes its snapshot and moves it to the end; overflow evicts from
//! the front. When the serialized cache exceeds the storage quota, the
//! oldest entries are evicted one at a time and the write retried.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::{Storage, StorageError};

/// One cached page snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub url: String,
    /// Serialized markup of the history element's content
    pub content: String,
    pub title: Option<String>,
    /// Vertical scroll position at save time
    #[serde(default)]
    pub scroll: f64,
}

/// Bounded snapshot cache
#[derive(Debug)]
pub struct HistoryCache {
    capacity: usize,
    entries: Vec<HistoryEntry>,
}

impl HistoryCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::new() }
    }

    /// Load the persisted cache, tolerating absent or corrupt data
    pub fn load(capacity: usize, storage: &dyn Storage, key: &str) -> Self {
        let mut cache = Self::new(capacity);
        if let Some(raw) = storage.get(key) {
            match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(entries) => cache.entries = entries,
                Err(e) => debug!("discarding corrupt history cache: {e}"),
            }
        }
        cache.truncate();
        cache
    }

    fn truncate(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.url == url)
    }

    /// Oldest-first URLs, for inspection
    pub fn urls(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.url.as_str()).collect()
    }

    /// Insert or refresh a snapshot. An existing entry for the URL moves
    /// to the most-recent position; overflow evicts the oldest.
    pub fn put(&mut self, entry: HistoryEntry) {
        self.entries.retain(|e| e.url != entry.url);
        self.entries.push(entry);
        self.truncate();
    }

    /// Persist the cache, evicting oldest entries on quota pressure.
    /// Returns false when even a single entry cannot be stored.
    pub fn persist(&mut self, storage: &mut dyn Storage, key: &str) -> bool {
        loop {
            let json = match serde_json::to_string(&self.entries) {
                Ok(j) => j,
                Err(e) => {
                    debug!("history cache serialization failed: {e}");
                    return false;
                }
            };
            match storage.set(key, &json) {
                Ok(()) => return true,
                Err(StorageError::QuotaExceeded) if !self.entries.is_empty() => {
                    debug!("history cache over quota, evicting oldest entry");
                    self.entries.remove(0);
                }
                Err(_) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MemoryStorage;

    fn entry(url: &str, content: &str) -> HistoryEntry {
        HistoryEntry {
            url: url.to_string(),
            content: content.to_string(),
            title: None,
            scroll: 0.0,
        }
    }

    #[test]
    fn test_upsert_moves_to_end() {
        let mut cache = HistoryCache::new(10);
        cache.put(entry("/a", "1"));
        cache.put(entry("/b", "2"));
        cache.put(entry("/a", "3"));
        assert_eq!(cache.urls(), vec!["/b", "/a"]);
        assert_eq!(cache.get("/a").unwrap().content, "3");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut cache = HistoryCache::new(3);
        for i in 0..5 {
            cache.put(entry(&format!("/p{i}"), "x"));
        }
        assert_eq!(cache.urls(), vec!["/p2", "/p3", "/p4"]);
    }

    #[test]
    fn test_round_trip() {
        let mut storage = MemoryStorage::new();
        let mut cache = HistoryCache::new(10);
        cache.put(entry("/a", "<p>a</p>"));
        cache.put(entry("/b", "<p>b</p>"));
        assert!(cache.persist(&mut storage, "k"));

        let loaded = HistoryCache::load(10, &storage, "k");
        assert_eq!(loaded.urls(), vec!["/a", "/b"]);
        assert_eq!(loaded.get("/b").unwrap().content, "<p>b</p>");
    }

    #[test]
    fn test_quota_evicts_and_retries() {
        // Quota fits roughly one entry's worth of JSON
        let mut storage = MemoryStorage::with_quota(120);
        let mut cache = HistoryCache::new(10);
        cache.put(entry("/a", &"x".repeat(60)));
        cache.put(entry("/b", "small"));
        assert!(cache.persist(&mut storage, "k"));
        // The oversized oldest entry was evicted to fit
        assert_eq!(cache.urls(), vec!["/b"]);
    }

    #[test]
    fn test_corrupt_cache_discarded() {
        let mut storage = MemoryStorage::new();
        storage.set("k", "not json").unwrap();
        let cache = HistoryCache::load(10, &storage, "k");
        assert!(cache.is_empty());
    }
}

//! Cache Store Module
//!
//! Keyspace of the in-process backend: HashMap storage with LRU tracking and
//! TTL expiration, mirroring the subset of Redis semantics the cache uses.

use std::collections::HashMap;

use crate::cache::{pattern, CacheEntry, LruTracker, StoreStats};

// == Cache Store ==
/// In-process keyspace with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Keyspace statistics
    stats: StoreStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: StoreStats::new(),
            max_entries: max_entries.max(1),
        }
    }

    // == Set With Expiry ==
    /// Stores a value expiring after `ttl_seconds` (SETEX semantics).
    ///
    /// Overwriting resets the TTL. At capacity, the least recently used
    /// entry is evicted to make room.
    pub fn set_ex(&mut self, key: String, value: String, ttl_seconds: u64) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
            }
        }

        self.lru.touch(&key);
        self.entries.insert(key, CacheEntry::new(value, ttl_seconds));
    }

    // == Get ==
    /// Retrieves a live value; expired entries are dropped and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<String> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                self.lru.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Delete ==
    /// Removes a key, returning whether a live entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.lru.remove(key);
                !entry.is_expired()
            }
            None => false,
        }
    }

    // == Keys ==
    /// Returns all live keys matching a glob pattern.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && pattern::matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Flush ==
    /// Removes every entry, returning how many were held.
    pub fn flush(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        count
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
            self.lru.remove(&key);
        }

        self.stats.record_expirations(count);
        count
    }

    // == Stats ==
    pub fn stats(&self) -> StoreStats {
        self.stats.clone()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet reclaimed
    /// (DBSIZE semantics).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_store_new() {
        let store = CacheStore::new(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(100);

        store.set_ex("key1".to_string(), "value1".to_string(), 300);

        assert_eq!(store.get("key1").as_deref(), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = CacheStore::new(100);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_store_delete() {
        let mut store = CacheStore::new(100);

        store.set_ex("key1".to_string(), "value1".to_string(), 300);
        assert!(store.delete("key1"));

        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_delete_nonexistent() {
        let mut store = CacheStore::new(100);
        assert!(!store.delete("nonexistent"));
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new(100);

        store.set_ex("key1".to_string(), "value1".to_string(), 300);
        store.set_ex("key1".to_string(), "value2".to_string(), 300);

        assert_eq!(store.get("key1").as_deref(), Some("value2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut store = CacheStore::new(100);

        store.set_ex("key1".to_string(), "value1".to_string(), 1);
        assert!(store.get("key1").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;

        assert_eq!(store.get("key1"), None);
        assert_eq!(store.stats().expirations, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = CacheStore::new(3);

        store.set_ex("key1".to_string(), "value1".to_string(), 300);
        store.set_ex("key2".to_string(), "value2".to_string(), 300);
        store.set_ex("key3".to_string(), "value3".to_string(), 300);

        // Cache is full, adding key4 should evict key1 (oldest)
        store.set_ex("key4".to_string(), "value4".to_string(), 300);

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("key1"), None);
        assert!(store.get("key2").is_some());
        assert!(store.get("key4").is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = CacheStore::new(3);

        store.set_ex("key1".to_string(), "value1".to_string(), 300);
        store.set_ex("key2".to_string(), "value2".to_string(), 300);
        store.set_ex("key3".to_string(), "value3".to_string(), 300);

        // Access key1 to make it most recently used
        store.get("key1");

        // Adding key4 should evict key2 (now oldest)
        store.set_ex("key4".to_string(), "value4".to_string(), 300);

        assert!(store.get("key1").is_some());
        assert_eq!(store.get("key2"), None);
    }

    #[test]
    fn test_store_keys_by_pattern() {
        let mut store = CacheStore::new(100);
        store.set_ex("ns:1".to_string(), "a".to_string(), 300);
        store.set_ex("ns:2".to_string(), "b".to_string(), 300);
        store.set_ex("other:1".to_string(), "c".to_string(), 300);

        let mut keys = store.keys("ns:*");
        keys.sort();
        assert_eq!(keys, vec!["ns:1".to_string(), "ns:2".to_string()]);
        assert!(store.keys("missing:*").is_empty());
    }

    #[test]
    fn test_store_flush() {
        let mut store = CacheStore::new(100);
        store.set_ex("a".to_string(), "1".to_string(), 300);
        store.set_ex("b".to_string(), "2".to_string(), 300);

        assert_eq!(store.flush(), 2);
        assert!(store.is_empty());
        assert_eq!(store.get("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_cleanup_expired() {
        let mut store = CacheStore::new(100);

        store.set_ex("key1".to_string(), "value1".to_string(), 1);
        store.set_ex("key2".to_string(), "value2".to_string(), 10);

        tokio::time::advance(Duration::from_secs(1)).await;

        let removed = store.cleanup_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("key2").is_some());
    }

    #[test]
    fn test_store_stats() {
        let mut store = CacheStore::new(100);

        store.set_ex("key1".to_string(), "value1".to_string(), 300);
        store.get("key1"); // hit
        store.get("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}

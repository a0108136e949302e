//! Cache Statistics Module
//!
//! Point-in-time figures for operational visibility: operation counters kept
//! by the cache client, keyspace counters kept by the in-process store, and
//! the report returned by `stats()`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Metrics ==
/// Lock-free operation counters updated by concurrent callers.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    invalidated: AtomicU64,
    computations: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A store failure absorbed by the cache.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidated(&self, count: u64) {
        self.invalidated.fetch_add(count, Ordering::Relaxed);
    }

    /// A `get_or_compute` fallback ran.
    pub fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> CacheCounters {
        CacheCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }
}

// == Cache Counters ==
/// Copy of [`CacheMetrics`] at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub sets: u64,
    pub deletes: u64,
    pub invalidated: u64,
    pub computations: u64,
}

impl CacheCounters {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Store Stats ==
/// Keyspace counters of the in-process store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries evicted due to LRU policy
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
}

impl StoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}

// == Stats Report ==
/// Result of `stats()`.
///
/// Serializes to `{"enabled": false}` when the store is not connected.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Whether caching is currently active
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    /// Number of keys held by the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    /// Backend-specific details
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_info: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<CacheCounters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
}

impl StatsReport {
    /// Report for a cache that is not connected.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            connected: None,
            entry_count: None,
            extra_info: BTreeMap::new(),
            counters: None,
            hit_rate: None,
        }
    }

    /// Report for a connected cache.
    pub fn connected(
        entry_count: u64,
        extra_info: BTreeMap<String, String>,
        counters: CacheCounters,
    ) -> Self {
        Self {
            enabled: true,
            connected: Some(true),
            entry_count: Some(entry_count),
            extra_info,
            hit_rate: Some(counters.hit_rate()),
            counters: Some(counters),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_start_at_zero() {
        let counters = CacheMetrics::new().snapshot();
        assert_eq!(counters, CacheCounters::default());
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_invalidated(3);
        metrics.record_computation();

        let counters = metrics.snapshot();
        assert_eq!(counters.hits, 2);
        assert_eq!(counters.misses, 1);
        assert_eq!(counters.invalidated, 3);
        assert_eq!(counters.computations, 1);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheCounters::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let counters = CacheCounters {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(counters.hit_rate(), 0.75);
    }

    #[test]
    fn test_store_stats_counters() {
        let mut stats = StoreStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_eviction();
        stats.record_expirations(4);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.expirations, 4);
    }

    #[test]
    fn test_disabled_report_serializes_minimal() {
        let json = serde_json::to_value(StatsReport::disabled()).unwrap();
        assert_eq!(json, serde_json::json!({ "enabled": false }));
    }

    #[test]
    fn test_connected_report_serializes_fields() {
        let mut info = BTreeMap::new();
        info.insert("provider".to_string(), "memory".to_string());
        let report = StatsReport::connected(7, info, CacheCounters::default());

        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["connected"], true);
        assert_eq!(json["entry_count"], 7);
        assert_eq!(json["extra_info"]["provider"], "memory");
        assert_eq!(json["hit_rate"], 0.0);
    }
}

//! Resilient Cache Module
//!
//! Cache-aside operations over the supervised store connection. Store
//! availability problems never reach callers: reads degrade to misses and
//! writes to no-ops. Only caller mistakes (zero TTL, unserializable values,
//! malformed patterns) and failing `get_or_compute` fallbacks are surfaced.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{
    pattern, Backend, BackendError, CacheMetrics, ConnectionManager, HealthState, StatsReport,
};
use crate::config::{Config, MAX_TTL_SECONDS};
use crate::error::{CacheError, Result};

/// Per-key gates for concurrent `get_or_compute` misses.
///
/// Guarded by a blocking mutex so a dropped flight can unregister itself
/// from `Drop`; it is never held across an await.
type FlightMap = SyncMutex<HashMap<String, Arc<Mutex<()>>>>;

fn lock_flights(flights: &FlightMap) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    flights.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registration of one caller in a key's flight, released on drop.
///
/// Dropping covers cancelled callers too, so a timed-out `get_or_compute`
/// does not leave its gate behind.
struct Flight<'a> {
    flights: &'a FlightMap,
    key: String,
    gate: Arc<Mutex<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut flights = lock_flights(self.flights);
        // Only the map and this caller still hold the gate
        let last = flights
            .get(&self.key)
            .is_some_and(|gate| Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) == 2);
        if last {
            flights.remove(&self.key);
        }
    }
}

/// Outcome of a raw lookup, before deserialization.
#[derive(Debug)]
enum Lookup {
    Hit(String),
    Miss,
    /// Store not connected; the call was not attempted
    Unavailable,
    Failed(BackendError),
}

// == Resilient Cache ==
/// Failure-aware cache-aside layer.
///
/// Construct once with [`ResilientCache::connect`] and share it (usually in
/// an `Arc`) with every consumer.
#[derive(Debug)]
pub struct ResilientCache {
    connection: ConnectionManager,
    default_ttl: u64,
    single_flight: bool,
    in_flight: FlightMap,
    metrics: CacheMetrics,
}

impl ResilientCache {
    // == Constructor ==
    /// Creates a cache without connecting.
    pub fn new(backend: Backend, config: &Config) -> Self {
        Self {
            connection: ConnectionManager::new(backend, config),
            default_ttl: config.default_ttl,
            single_flight: config.single_flight,
            in_flight: SyncMutex::new(HashMap::new()),
            metrics: CacheMetrics::new(),
        }
    }

    /// Creates a cache and attempts the initial connection.
    ///
    /// An unreachable store does not fail construction; caching stays
    /// disabled until the background reconnect succeeds.
    pub async fn connect(backend: Backend, config: &Config) -> Self {
        let cache = Self::new(backend, config);
        let state = cache.connection.connect().await;
        if state != HealthState::Connected {
            warn!(
                provider = cache.connection.backend().provider_name(),
                state = %state,
                "Cache store unavailable at startup, continuing without cache"
            );
        }
        cache
    }

    // == Get ==
    /// Returns the cached value, or `None` on a miss.
    ///
    /// Store errors, an unavailable store, and cached data that no longer
    /// deserializes as `T` all read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.lookup(key).await {
            Lookup::Hit(raw) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.metrics.record_hit();
                    debug!(key, op = "get", outcome = "hit", "Cache HIT");
                    Some(value)
                }
                Err(e) => {
                    self.metrics.record_miss();
                    warn!(key, op = "get", outcome = "corrupt", error = %e, "Cached value unreadable, treating as miss");
                    None
                }
            },
            Lookup::Miss => {
                self.metrics.record_miss();
                debug!(key, op = "get", outcome = "miss", "Cache MISS");
                None
            }
            Lookup::Unavailable => {
                self.metrics.record_miss();
                debug!(key, op = "get", outcome = "unavailable", "Cache disabled, treating as miss");
                None
            }
            Lookup::Failed(e) => {
                self.metrics.record_miss();
                self.metrics.record_error();
                warn!(key, op = "get", outcome = "error", error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn lookup(&self, key: &str) -> Lookup {
        if !self.connection.is_connected() {
            return Lookup::Unavailable;
        }
        let backend = self.connection.backend();
        match self.connection.execute(backend.get(key)).await {
            Ok(Some(raw)) => Lookup::Hit(raw),
            Ok(None) => Lookup::Miss,
            Err(e) => Lookup::Failed(e),
        }
    }

    // == Set ==
    /// Stores `value` for `ttl` seconds (the default TTL when `None`).
    ///
    /// Best-effort: a disconnected or failing store is logged and ignored.
    ///
    /// # Errors
    /// - [`CacheError::InvalidTtl`] for a TTL of zero or above [`MAX_TTL_SECONDS`]
    /// - [`CacheError::Serialization`] if `value` cannot be encoded
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> Result<()> {
        let ttl = self.resolve_ttl(ttl)?;
        let payload = serde_json::to_string(value)?;

        if !self.connection.is_connected() {
            debug!(key, op = "set", outcome = "skipped", "Cache disabled, write dropped");
            return Ok(());
        }

        let backend = self.connection.backend();
        match self.connection.execute(backend.set_ex(key, ttl, &payload)).await {
            Ok(()) => {
                self.metrics.record_set();
                debug!(key, op = "set", outcome = "stored", ttl_seconds = ttl, "Cache SET");
            }
            Err(e) => {
                self.metrics.record_error();
                warn!(key, op = "set", outcome = "error", error = %e, "Cache write failed, ignoring");
            }
        }
        Ok(())
    }

    // == Delete ==
    /// Removes a key. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) {
        if !self.connection.is_connected() {
            debug!(key, op = "delete", outcome = "skipped", "Cache disabled, delete dropped");
            return;
        }

        let backend = self.connection.backend();
        let keys = [key.to_string()];
        match self.connection.execute(backend.del(&keys)).await {
            Ok(removed) => {
                self.metrics.record_delete();
                debug!(key, op = "delete", outcome = "ok", removed, "Cache DEL");
            }
            Err(e) => {
                self.metrics.record_error();
                warn!(key, op = "delete", outcome = "error", error = %e, "Cache delete failed, ignoring");
            }
        }
    }

    // == Invalidate Pattern ==
    /// Deletes every key matching a glob pattern, returning how many were removed.
    ///
    /// Keys are enumerated first and deleted as one batch afterwards; a key
    /// written in between may survive.
    ///
    /// # Errors
    /// [`CacheError::InvalidPattern`] for a malformed pattern.
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<u64> {
        pattern::validate(pattern)?;

        if !self.connection.is_connected() {
            debug!(pattern, op = "invalidate", outcome = "skipped", "Cache disabled, invalidation dropped");
            return Ok(0);
        }

        let backend = self.connection.backend();
        let keys = match self.connection.execute(backend.keys(pattern)).await {
            Ok(keys) => keys,
            Err(e) => {
                self.metrics.record_error();
                warn!(pattern, op = "invalidate", outcome = "error", error = %e, "Cache key scan failed, ignoring");
                return Ok(0);
            }
        };
        if keys.is_empty() {
            debug!(pattern, op = "invalidate", outcome = "ok", removed = 0, "No keys matched");
            return Ok(0);
        }

        match self.connection.execute(backend.del(&keys)).await {
            Ok(removed) => {
                self.metrics.record_invalidated(removed);
                debug!(pattern, op = "invalidate", outcome = "ok", removed, "Cache pattern DEL");
                Ok(removed)
            }
            Err(e) => {
                self.metrics.record_error();
                warn!(pattern, op = "invalidate", outcome = "error", error = %e, "Cache batch delete failed, ignoring");
                Ok(0)
            }
        }
    }

    // == Flush All ==
    /// Empties the entire store. Administrative use only.
    pub async fn flush_all(&self) {
        if !self.connection.is_connected() {
            debug!(op = "flush", outcome = "skipped", "Cache disabled, flush dropped");
            return;
        }

        let backend = self.connection.backend();
        match self.connection.execute(backend.flush_all()).await {
            Ok(()) => warn!(op = "flush", outcome = "ok", "Cache flushed"),
            Err(e) => {
                self.metrics.record_error();
                warn!(op = "flush", outcome = "error", error = %e, "Cache flush failed, ignoring");
            }
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or runs `compute`, caches its
    /// result for `ttl` seconds and returns it.
    ///
    /// `compute` never runs on a hit. Its error is returned unchanged and
    /// nothing is cached. Failing to cache a computed value does not affect
    /// the result. With single-flight enabled, concurrent misses on the same
    /// key wait for the first caller and reuse what it cached.
    ///
    /// # Errors
    /// The error of `compute`, or [`CacheError::InvalidTtl`] (converted into
    /// `E`) before anything runs.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl: Option<u64>,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let ttl = self.resolve_ttl(ttl)?;

        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        // Coalescing only pays off when a peer's result can be read back
        if !self.single_flight || !self.connection.is_connected() {
            return self.compute_and_store(key, compute, ttl).await;
        }

        let flight = self.enter_flight(key);
        let _turn = flight.gate.lock().await;
        match self.get(key).await {
            Some(hit) => {
                debug!(key, op = "get_or_compute", outcome = "coalesced", "Reused value computed by a concurrent caller");
                Ok(hit)
            }
            None => self.compute_and_store(key, compute, ttl).await,
        }
    }

    async fn compute_and_store<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl: u64,
    ) -> std::result::Result<T, E>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.metrics.record_computation();
        let value = compute().await?;

        if let Err(e) = self.set(key, &value, Some(ttl)).await {
            warn!(key, op = "get_or_compute", outcome = "uncached", error = %e, "Computed value could not be cached");
        }
        Ok(value)
    }

    fn enter_flight(&self, key: &str) -> Flight<'_> {
        let gate = Arc::clone(
            lock_flights(&self.in_flight)
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        Flight {
            flights: &self.in_flight,
            key: key.to_string(),
            gate,
        }
    }

    // == Stats ==
    /// Point-in-time statistics; `{enabled: false}` when not connected.
    pub async fn stats(&self) -> StatsReport {
        if !self.connection.is_connected() {
            return StatsReport::disabled();
        }

        let backend = self.connection.backend();
        let entry_count = match self.connection.execute(backend.db_size()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(op = "stats", outcome = "error", error = %e, "Cache size query failed");
                return StatsReport::disabled();
            }
        };

        let mut extra_info = match self.connection.execute(backend.info()).await {
            Ok(info) => info,
            Err(e) => {
                debug!(op = "stats", outcome = "partial", error = %e, "Cache info query failed");
                Default::default()
            }
        };
        extra_info.insert("provider".to_string(), backend.provider_name().to_string());
        extra_info.insert(
            "reconnects".to_string(),
            self.connection.reconnect_count().to_string(),
        );
        extra_info.insert("default_ttl".to_string(), self.default_ttl.to_string());

        StatsReport::connected(entry_count, extra_info, self.metrics.snapshot())
    }

    // == Close ==
    /// Releases the store connection. Subsequent operations degrade.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    // == Accessors ==
    pub fn health(&self) -> HealthState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    fn resolve_ttl(&self, ttl: Option<u64>) -> Result<u64> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl == 0 || ttl > MAX_TTL_SECONDS {
            return Err(CacheError::InvalidTtl(ttl));
        }
        Ok(ttl)
    }
}

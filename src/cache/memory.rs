//! In-Process Backend Module
//!
//! A [`CacheStore`] behind the backend contract, for local development and
//! tests. Outages and slow responses can be simulated on a running instance.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{BackendError, BackendResult, CacheBackend, CacheStore};

#[derive(Debug)]
struct Shared {
    store: RwLock<CacheStore>,
    /// Whether the simulated server is up
    online: AtomicBool,
    /// Whether this client holds an open connection
    connected: AtomicBool,
    /// Artificial delay applied to every call, in milliseconds
    latency_ms: AtomicU64,
}

// == Memory Backend ==
/// In-process store. Clones share the same keyspace.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an online store holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: RwLock::new(CacheStore::new(max_entries)),
                online: AtomicBool::new(true),
                connected: AtomicBool::new(false),
                latency_ms: AtomicU64::new(0),
            }),
        }
    }

    // == Outage Simulation ==
    /// Simulates the store going down. Open connections are reset and,
    /// like a non-persistent server, the keyspace is lost.
    pub async fn take_offline(&self) {
        self.shared.online.store(false, Ordering::Release);
        self.shared.connected.store(false, Ordering::Release);
        let dropped = self.shared.store.write().await.flush();
        info!(dropped = dropped, "In-process store taken offline");
    }

    /// Brings the store back; clients must reconnect.
    pub fn bring_online(&self) {
        self.shared.online.store(true, Ordering::Release);
        info!("In-process store back online");
    }

    pub fn is_online(&self) -> bool {
        self.shared.online.load(Ordering::Acquire)
    }

    /// Delays every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.shared
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::Release);
    }

    // == Purge Expired ==
    /// Reclaims expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.shared.store.write().await.cleanup_expired()
    }

    async fn ready(&self) -> BackendResult<()> {
        let latency = self.shared.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.is_online() {
            return Err(BackendError::closed("connection reset by store"));
        }
        if !self.shared.connected.load(Ordering::Acquire) {
            return Err(BackendError::closed("client is not connected"));
        }
        Ok(())
    }
}

impl CacheBackend for MemoryBackend {
    async fn connect(&self) -> BackendResult<()> {
        let latency = self.shared.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.is_online() {
            return Err(BackendError::transport("connection refused"));
        }
        self.shared.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.ready().await?;
        Ok(self.shared.store.write().await.get(key))
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> BackendResult<()> {
        self.ready().await?;
        if ttl_seconds == 0 {
            return Err(BackendError::command("invalid expire time in 'setex' command"));
        }
        self.shared
            .store
            .write()
            .await
            .set_ex(key.to_string(), value.to_string(), ttl_seconds);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> BackendResult<u64> {
        self.ready().await?;
        let mut store = self.shared.store.write().await;
        Ok(keys.iter().filter(|key| store.delete(key)).count() as u64)
    }

    async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>> {
        self.ready().await?;
        Ok(self.shared.store.read().await.keys(pattern))
    }

    async fn flush_all(&self) -> BackendResult<()> {
        self.ready().await?;
        self.shared.store.write().await.flush();
        Ok(())
    }

    async fn db_size(&self) -> BackendResult<u64> {
        self.ready().await?;
        Ok(self.shared.store.read().await.len() as u64)
    }

    async fn info(&self) -> BackendResult<BTreeMap<String, String>> {
        self.ready().await?;
        let store = self.shared.store.read().await;
        let stats = store.stats();

        let mut info = BTreeMap::new();
        info.insert("max_entries".to_string(), store.max_entries().to_string());
        info.insert("store_hits".to_string(), stats.hits.to_string());
        info.insert("store_misses".to_string(), stats.misses.to_string());
        info.insert("store_evictions".to_string(), stats.evictions.to_string());
        info.insert("store_expirations".to_string(), stats.expirations.to_string());
        Ok(info)
    }

    async fn close(&self) {
        self.shared.connected.store(false, Ordering::Release);
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BackendErrorKind;

    #[tokio::test]
    async fn test_calls_require_connect() {
        let backend = MemoryBackend::new(100);

        let err = backend.get("k").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Closed);

        backend.connect().await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_get_del() {
        let backend = MemoryBackend::new(100);
        backend.connect().await.unwrap();

        backend.set_ex("k", 60, "\"v\"").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("\"v\""));
        assert_eq!(backend.db_size().await.unwrap(), 1);

        let removed = backend
            .del(&["k".to_string(), "absent".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_rejected_by_store() {
        let backend = MemoryBackend::new(100);
        backend.connect().await.unwrap();

        let err = backend.set_ex("k", 0, "v").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Command);
    }

    #[tokio::test]
    async fn test_offline_resets_and_refuses() {
        let backend = MemoryBackend::new(100);
        backend.connect().await.unwrap();
        backend.set_ex("k", 60, "v").await.unwrap();

        backend.take_offline().await;
        assert_eq!(
            backend.get("k").await.unwrap_err().kind,
            BackendErrorKind::Closed
        );
        assert_eq!(
            backend.connect().await.unwrap_err().kind,
            BackendErrorKind::Transport
        );

        backend.bring_online();
        backend.connect().await.unwrap();
        // Contents did not survive the outage
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_keyspace() {
        let backend = MemoryBackend::new(100);
        let handle = backend.clone();
        backend.connect().await.unwrap();

        backend.set_ex("shared", 60, "v").await.unwrap();
        assert_eq!(handle.get("shared").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_info_reports_store_counters() {
        let backend = MemoryBackend::new(5);
        backend.connect().await.unwrap();
        backend.set_ex("k", 60, "v").await.unwrap();
        backend.get("k").await.unwrap();

        let info = backend.info().await.unwrap();
        assert_eq!(info["max_entries"], "5");
        assert_eq!(info["store_hits"], "1");
    }
}

//! Backend Module
//!
//! The contract the cache consumes from a key-value store, and enum dispatch
//! over the concrete stores.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::cache::{MemoryBackend, RedisBackend};
use crate::config::{BackendKind, Config};
use crate::error::Result;

// == Backend Error ==
/// How a store call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Store unreachable, refused or reset the connection
    Transport,
    /// Connection closed underneath the client
    Closed,
    /// Call did not complete within its bound
    Timeout,
    /// Store rejected the command itself; the connection is fine
    Command,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendErrorKind::Transport => "transport",
            BackendErrorKind::Closed => "closed",
            BackendErrorKind::Timeout => "timeout",
            BackendErrorKind::Command => "command",
        };
        f.write_str(name)
    }
}

/// Failure reported by a store call.
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transport, message)
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Closed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Command, message)
    }

    fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// True when the failure says something about the connection rather
    /// than about the command.
    pub fn is_connection_failure(&self) -> bool {
        self.kind != BackendErrorKind::Command
    }
}

/// Result type for store calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

// == Cache Backend Trait ==
/// Operations consumed from a key-value store.
///
/// Implementations report failures as-is; timeouts, health tracking and
/// degradation are layered on top by the connection manager.
pub trait CacheBackend: Send + Sync {
    /// Establish (or re-establish) the connection.
    fn connect(&self) -> impl Future<Output = BackendResult<()>> + Send;

    /// `GET key`; `Ok(None)` on a miss.
    fn get(&self, key: &str) -> impl Future<Output = BackendResult<Option<String>>> + Send;

    /// `SETEX key ttl value`
    fn set_ex(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// `DEL key [key ...]`, returning how many keys existed.
    fn del(&self, keys: &[String]) -> impl Future<Output = BackendResult<u64>> + Send;

    /// All keys currently matching a glob pattern.
    fn keys(&self, pattern: &str) -> impl Future<Output = BackendResult<Vec<String>>> + Send;

    /// `FLUSHALL`
    fn flush_all(&self) -> impl Future<Output = BackendResult<()>> + Send;

    /// `DBSIZE`
    fn db_size(&self) -> impl Future<Output = BackendResult<u64>> + Send;

    /// Store-specific details for the stats report.
    fn info(&self) -> impl Future<Output = BackendResult<BTreeMap<String, String>>> + Send;

    /// Release the connection.
    fn close(&self) -> impl Future<Output = ()> + Send;

    fn provider_name(&self) -> &'static str;
}

// == Backend ==
/// Concrete store behind the cache.
#[derive(Debug)]
pub enum Backend {
    /// Remote Redis server (boxed to keep the enum small)
    Redis(Box<RedisBackend>),
    /// In-process store
    Memory(MemoryBackend),
}

impl Backend {
    /// Builds the backend selected by the configuration.
    ///
    /// No connection is attempted here.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.backend {
            BackendKind::Redis => Ok(Backend::Redis(Box::new(RedisBackend::new(
                &config.redis_url,
            )?))),
            BackendKind::Memory => Ok(Backend::Memory(MemoryBackend::new(config.max_entries))),
        }
    }

    /// The in-process store, if that is what backs the cache.
    pub fn as_memory(&self) -> Option<&MemoryBackend> {
        match self {
            Backend::Memory(m) => Some(m),
            Backend::Redis(_) => None,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Backend::Redis(b) => b.provider_name(),
            Backend::Memory(b) => b.provider_name(),
        }
    }

    pub async fn connect(&self) -> BackendResult<()> {
        match self {
            Backend::Redis(b) => b.connect().await,
            Backend::Memory(b) => b.connect().await,
        }
    }

    pub async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        match self {
            Backend::Redis(b) => b.get(key).await,
            Backend::Memory(b) => b.get(key).await,
        }
    }

    pub async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> BackendResult<()> {
        match self {
            Backend::Redis(b) => b.set_ex(key, ttl_seconds, value).await,
            Backend::Memory(b) => b.set_ex(key, ttl_seconds, value).await,
        }
    }

    pub async fn del(&self, keys: &[String]) -> BackendResult<u64> {
        match self {
            Backend::Redis(b) => b.del(keys).await,
            Backend::Memory(b) => b.del(keys).await,
        }
    }

    pub async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>> {
        match self {
            Backend::Redis(b) => b.keys(pattern).await,
            Backend::Memory(b) => b.keys(pattern).await,
        }
    }

    pub async fn flush_all(&self) -> BackendResult<()> {
        match self {
            Backend::Redis(b) => b.flush_all().await,
            Backend::Memory(b) => b.flush_all().await,
        }
    }

    pub async fn db_size(&self) -> BackendResult<u64> {
        match self {
            Backend::Redis(b) => b.db_size().await,
            Backend::Memory(b) => b.db_size().await,
        }
    }

    pub async fn info(&self) -> BackendResult<BTreeMap<String, String>> {
        match self {
            Backend::Redis(b) => b.info().await,
            Backend::Memory(b) => b.info().await,
        }
    }

    pub async fn close(&self) {
        match self {
            Backend::Redis(b) => b.close().await,
            Backend::Memory(b) => b.close().await,
        }
    }
}

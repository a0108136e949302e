//! Cache Module
//!
//! Resilient cache-aside layer in front of a key-value store: connection
//! supervision, degraded-mode operations, read-through and statistics.

mod backend;
mod client;
mod connection;
mod entry;
mod health;
mod lru;
mod memory;
pub mod pattern;
mod redis_store;
mod stats;
mod store;


// Re-export public types
pub use backend::{Backend, BackendError, BackendErrorKind, BackendResult, CacheBackend};
pub use client::ResilientCache;
pub use connection::{ConnectionManager, LifecycleEvent, RetryPolicy};
pub use entry::CacheEntry;
pub use health::{AtomicHealth, HealthState};
pub use lru::LruTracker;
pub use memory::MemoryBackend;
pub use redis_store::RedisBackend;
pub use stats::{CacheCounters, CacheMetrics, StatsReport, StoreStats};
pub use store::CacheStore;

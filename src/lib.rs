//! Resilient Cache - a failure-aware cache-aside layer
//!
//! Puts a remote key-value store in front of slower data sources without
//! letting store outages break the callers: reads degrade to misses, writes
//! to no-ops, and the connection heals itself in the background.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Backend, HealthState, MemoryBackend, ResilientCache};
pub use config::Config;
pub use error::CacheError;
pub use tasks::spawn_cleanup_task;

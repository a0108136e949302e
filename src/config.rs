//! Configuration Module
//!
//! Loads the cache layer configuration from environment variables. The
//! resulting [`Config`] is handed to the cache at construction time.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Longest accepted TTL: 100 years. Well inside what Redis `SETEX` accepts and
/// what a monotonic clock can represent as a deadline.
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

// == Backend Kind ==
/// Which key-value store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Remote Redis server
    Redis,
    /// In-process store (local development and tests)
    Memory,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "memory" => Ok(BackendKind::Memory),
            other => Err(CacheError::Config(format!("unknown cache backend '{}'", other))),
        }
    }
}

/// Cache layer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store implementation
    pub backend: BackendKind,
    /// Address of the Redis server
    pub redis_url: String,
    /// TTL in seconds applied when a caller does not pass one
    pub default_ttl: u64,
    /// Bound on a single connection attempt
    pub connect_timeout: Duration,
    /// Bound on every store command
    pub command_timeout: Duration,
    /// Reconnect delay grows by this much per attempt
    pub retry_step: Duration,
    /// Reconnect delay ceiling
    pub retry_max_delay: Duration,
    /// Coalesce concurrent misses for the same key in `get_or_compute`
    pub single_flight: bool,
    /// Capacity of the in-process store
    pub max_entries: usize,
    /// Expiry sweep interval of the in-process store, in seconds
    pub cleanup_interval: u64,
    /// Admin HTTP port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `REDIS_URL` - Store address (default: redis://127.0.0.1:6379)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `CONNECT_TIMEOUT_MS` - Connect attempt bound (default: 5000)
    /// - `COMMAND_TIMEOUT_MS` - Per-command bound (default: 2000)
    /// - `RETRY_STEP_MS` - Reconnect backoff step (default: 50)
    /// - `RETRY_MAX_DELAY_MS` - Reconnect backoff ceiling (default: 2000)
    /// - `SINGLE_FLIGHT` - Coalesce concurrent misses (default: true)
    /// - `MAX_ENTRIES` - In-process store capacity (default: 10000)
    /// - `CLEANUP_INTERVAL` - In-process sweep frequency in seconds (default: 1)
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env_or("CACHE_BACKEND", defaults.backend),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            connect_timeout: env_ms("CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            command_timeout: env_ms("COMMAND_TIMEOUT_MS", defaults.command_timeout),
            retry_step: env_ms("RETRY_STEP_MS", defaults.retry_step),
            retry_max_delay: env_ms("RETRY_MAX_DELAY_MS", defaults.retry_max_delay),
            single_flight: env_or("SINGLE_FLIGHT", defaults.single_flight),
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    // == Validate ==
    /// Rejects values the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl == 0 {
            return Err(CacheError::Config("DEFAULT_TTL must be positive".to_string()));
        }
        if self.default_ttl > MAX_TTL_SECONDS {
            return Err(CacheError::Config(format!(
                "DEFAULT_TTL must not exceed {} seconds",
                MAX_TTL_SECONDS
            )));
        }
        if self.connect_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err(CacheError::Config("timeouts must be positive".to_string()));
        }
        if self.retry_step.is_zero() {
            return Err(CacheError::Config("RETRY_STEP_MS must be positive".to_string()));
        }
        if self.retry_max_delay < self.retry_step {
            return Err(CacheError::Config(
                "RETRY_MAX_DELAY_MS must not be smaller than RETRY_STEP_MS".to_string(),
            ));
        }
        if self.max_entries == 0 {
            return Err(CacheError::Config("MAX_ENTRIES must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            default_ttl: 3600,
            connect_timeout: Duration::from_millis(5000),
            command_timeout: Duration::from_millis(2000),
            retry_step: Duration::from_millis(50),
            retry_max_delay: Duration::from_millis(2000),
            single_flight: true,
            max_entries: 10_000,
            cleanup_interval: 1,
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_ms(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

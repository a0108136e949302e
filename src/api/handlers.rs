//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Backend, ResilientCache, StatsReport};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, FlushResponse, GetResponse, HealthResponse, InvalidateRequest,
    InvalidateResponse, SetRequest, SetResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache client
    pub cache: Arc<ResilientCache>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: ResilientCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Builds the configured backend and connects the cache.
    ///
    /// Only a configuration error fails; an unreachable store does not.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let backend = Backend::from_config(config)?;
        Ok(Self::new(ResilientCache::connect(backend, config).await))
    }
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set(&req.key, &req.value, req.ttl).await?;

    Ok(Json(SetResponse::new(req.key, state.cache.is_connected())))
}

/// Handler for GET /cache/:key
///
/// A miss and an unavailable cache both answer 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get::<Value>(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.cache.delete(&key).await;
    Json(DeleteResponse::new(key))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let deleted = state.cache.invalidate_pattern(&req.pattern).await?;
    Ok(Json(InvalidateResponse::new(req.pattern, deleted)))
}

/// Handler for POST /cache/flush
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    state.cache.flush_all().await;
    Json(FlushResponse::new())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsReport> {
    Json(state.cache.stats().await)
}

/// Handler for GET /health
///
/// Always 200: the service keeps serving with the cache down.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.health()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{HealthState, MemoryBackend};
    use serde_json::json;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            connect_timeout: Duration::from_millis(200),
            command_timeout: Duration::from_millis(200),
            ..Config::default()
        }
    }

    async fn test_state() -> (AppState, MemoryBackend) {
        let store = MemoryBackend::new(100);
        let cache = ResilientCache::connect(Backend::Memory(store.clone()), &test_config()).await;
        (AppState::new(cache), store)
    }

    fn set_request(key: &str, value: Value, ttl: Option<u64>) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let (state, _) = test_state().await;

        let req = set_request("event:1", json!({"name": "Concert"}), None);
        let response = set_handler(State(state.clone()), Json(req)).await.unwrap();
        assert!(response.cached);

        let response = get_handler(State(state), Path("event:1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value["name"], "Concert");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let (state, _) = test_state().await;

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (state, _) = test_state().await;

        let req = set_request("to_delete", json!("value"), None);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        // Idempotent
        delete_handler(State(state.clone()), Path("to_delete".to_string())).await;

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let (state, _) = test_state().await;
        for key in ["event:1:a", "event:1:b", "event:2:a"] {
            let req = set_request(key, json!(1), None);
            set_handler(State(state.clone()), Json(req)).await.unwrap();
        }

        let req = InvalidateRequest {
            pattern: "event:1:*".to_string(),
        };
        let response = invalidate_handler(State(state.clone()), Json(req))
            .await
            .unwrap();
        assert_eq!(response.deleted, 2);
        assert!(get_handler(State(state), Path("event:2:a".to_string()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalidate_rejects_malformed_pattern() {
        let (state, _) = test_state().await;
        let req = InvalidateRequest {
            pattern: "event:[".to_string(),
        };
        let result = invalidate_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidPattern(_))));
    }

    #[tokio::test]
    async fn test_flush_handler() {
        let (state, _) = test_state().await;
        let req = set_request("k", json!(true), None);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        flush_handler(State(state.clone())).await;

        let stats = stats_handler(State(state)).await;
        assert_eq!(stats.entry_count, Some(0));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = test_state().await;

        let response = stats_handler(State(state)).await;
        assert!(response.enabled);
        assert_eq!(response.entry_count, Some(0));
    }

    #[tokio::test]
    async fn test_health_handler_reports_cache_state() {
        let (state, store) = test_state().await;

        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.cache_state, HealthState::Connected);

        store.take_offline().await;
        state.cache.close().await;
        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.cache_state, HealthState::Disconnected);
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let (state, _) = test_state().await;

        let req = set_request("", json!("value"), None);
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));

        let req = set_request("key", json!("value"), Some(0));
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidTtl(0))));
    }

    #[tokio::test]
    async fn test_set_while_offline_is_not_an_error() {
        let (state, store) = test_state().await;
        store.take_offline().await;
        state.cache.close().await;

        let req = set_request("key", json!("value"), None);
        let response = set_handler(State(state), Json(req)).await.unwrap();
        assert!(!response.cached);
    }
}

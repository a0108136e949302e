//! Error types for the cache layer
//!
//! Only caller-facing contract violations live here. Store availability
//! failures are carried as [`BackendError`](crate::cache::BackendError) and
//! absorbed by the cache before they reach a caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache layer and its admin surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// TTL of zero seconds, or above `MAX_TTL_SECONDS`
    #[error("Invalid TTL: {0}s (must be between 1 second and 100 years)")]
    InvalidTtl(u64),

    /// Malformed glob pattern
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Key not present (admin surface only)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Malformed admin request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Serialization(_)
            | CacheError::InvalidTtl(_)
            | CacheError::InvalidPattern(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;

//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /health` - Service health and cache connection state
//! - `GET /stats` - Cache statistics
//! - `GET /cache/:key` - Read a cached JSON value
//! - `PUT /cache` - Store a JSON value
//! - `DELETE /cache/:key` - Delete a key
//! - `POST /cache/invalidate` - Delete keys matching a glob pattern
//! - `POST /cache/flush` - Empty the store

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

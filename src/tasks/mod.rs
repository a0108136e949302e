//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: reclaims expired entries of the in-process store

mod cleanup;

pub use cleanup::spawn_cleanup_task;

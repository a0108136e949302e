//! Health State Module
//!
//! Connection health shared between the connection manager (sole writer)
//! and every cache operation (readers).

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

// == Health State ==
/// Connection health of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Store reachable; operations are forwarded
    Connected,
    /// Connection closed; operations degrade
    Disconnected,
    /// Transport error observed; operations degrade
    Errored,
}

impl HealthState {
    fn as_u8(self) -> u8 {
        match self {
            HealthState::Connected => 0,
            HealthState::Disconnected => 1,
            HealthState::Errored => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => HealthState::Connected,
            2 => HealthState::Errored,
            _ => HealthState::Disconnected,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthState::Connected => "connected",
            HealthState::Disconnected => "disconnected",
            HealthState::Errored => "errored",
        };
        f.write_str(name)
    }
}

// == Atomic Health ==
/// Lock-free holder for a [`HealthState`].
#[derive(Debug)]
pub struct AtomicHealth(AtomicU8);

impl AtomicHealth {
    /// Creates a holder in the `Disconnected` state.
    pub fn new() -> Self {
        Self(AtomicU8::new(HealthState::Disconnected.as_u8()))
    }

    /// Current state.
    pub fn load(&self) -> HealthState {
        HealthState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stores `next` and returns the previous state.
    pub fn swap(&self, next: HealthState) -> HealthState {
        HealthState::from_u8(self.0.swap(next.as_u8(), Ordering::AcqRel))
    }
}

impl Default for AtomicHealth {
    fn default() -> Self {
        Self::new()
    }
}

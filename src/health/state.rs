//! Connection health state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Health state of a single connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthState {
    /// No probe has completed since creation or reconfiguration.
    Unknown = 0,
    Healthy = 1,
    Broken = 2,
    /// Heartbeat stopped for good.
    Closed = 3,
}

impl HealthState {
    /// Only healthy connections may be selected.
    pub fn is_healthy(self) -> bool {
        self == HealthState::Healthy
    }
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Broken,
            3 => HealthState::Closed,
            _ => HealthState::Unknown,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Broken => "broken",
            HealthState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Last computed health of a connection.
///
/// Written only by the connection's heartbeat (or by its owner once the
/// heartbeat is stopped); readers get the latest value without blocking.
#[derive(Debug)]
pub struct HealthCell {
    state: AtomicU8,
}

impl HealthCell {
    pub fn new(state: HealthState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    pub fn get(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one.
    pub fn set(&self, state: HealthState) -> HealthState {
        HealthState::from(self.state.swap(state as u8, Ordering::AcqRel))
    }
}

impl Default for HealthCell {
    fn default() -> Self {
        Self::new(HealthState::Unknown)
    }
}

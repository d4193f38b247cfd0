//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Connection created
//!     → active.rs: synchronous first probe
//!     → active.rs: heartbeat task, one probe per interval tick
//!     → state.rs: HealthCell updated after every probe
//!
//! Selection (load_balancer)
//!     → reads HealthCell without waiting on the probe
//! ```
//!
//! # State machine (state.rs)
//! ```text
//! Unknown ──first probe──▶ Healthy ⇄ Broken
//!    ▲                        │
//!    └──── set_interval ──────┘        any ──close──▶ Closed
//! ```
//!
//! # Design Decisions
//! - One heartbeat task per connection; no lock shared between connections
//! - Probes of one connection never overlap
//! - Probe failures are logged and folded into the health state, never returned

pub mod active;
pub mod state;

pub use active::{Heartbeat, Monitor, ProbeError, Prober};
pub use state::{HealthCell, HealthState};

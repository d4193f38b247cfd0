//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Transport asks for a connection
//!     → Balancer::get()
//!         - round_robin.rs (rotate through connections, skip unhealthy)
//!     → connection.rs (target + cached health of one backend)
//!     → Return connection or Error::NoConnection
//! ```
//!
//! # Design Decisions
//! - Membership is fixed when the balancer is built
//! - Unhealthy connections are skipped, never removed
//! - Selection reads cached health; it never waits on a probe

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

pub mod connection;
pub mod round_robin;

pub use connection::{Connection, ConnectionSnapshot, HttpConnection, StaticConnection, Target};
pub use round_robin::RoundRobin;

/// Chooses the connection that serves the next request.
pub trait Balancer: Send + Sync + fmt::Debug {
    /// Connection for the next request, or [`Error::NoConnection`](crate::Error::NoConnection).
    fn get(&self) -> Result<Arc<dyn Connection>>;

    /// Current members in rotation order. The list is a copy; the
    /// connections themselves are shared.
    fn connections(&self) -> Vec<Arc<dyn Connection>>;

    /// Detached copies of every member.
    fn snapshots(&self) -> Vec<ConnectionSnapshot> {
        self.connections().iter().map(|c| c.snapshot()).collect()
    }
}

impl<B: Balancer + ?Sized> Balancer for Arc<B> {
    fn get(&self) -> Result<Arc<dyn Connection>> {
        (**self).get()
    }

    fn connections(&self) -> Vec<Arc<dyn Connection>> {
        (**self).connections()
    }
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! health, load_balancer, http
//!     → tracing events (target = "balancers::...")
//!     → logging.rs (subscriber, filter, formatting)
//!     → stderr
//! ```
//!
//! # Design Decisions
//! - The library only emits events; installing a subscriber is up to the binary
//! - `RUST_LOG` takes precedence over the configured level

pub mod logging;

pub use logging::init_logging;

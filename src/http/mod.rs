//! Request interception subsystem.
//!
//! # Data Flow
//! ```text
//! Application request
//!     → transport.rs (ask balancer for a connection)
//!     → request.rs (attach ID, copy parts, rewrite scheme/host/user-info)
//!     → in_flight.rs (record original ID → rewritten ID)
//!     → upstream.rs (execute rewritten request)
//!     → body.rs (release the record at end-of-stream or drop)
//!     → Response to application
//! ```
//!
//! # Design Decisions
//! - Requests are identified by generated IDs, not by address
//! - Only routing-relevant URI parts change; everything else is forwarded as-is
//! - Cancellation is best effort: it reaches the upstream only while in flight,
//!   which lasts until the response body ends

pub mod auth;
pub mod body;
pub mod in_flight;
pub mod request;
pub mod transport;
pub mod upstream;

pub use auth::apply_basic_auth;
pub use body::TrackedBody;
pub use request::{clone_parts, request_id, rewrite_uri, RequestId};
pub use transport::Transport;
pub use upstream::{Cancel, HyperUpstream, Upstream, UpstreamBody, UpstreamError};

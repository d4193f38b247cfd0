//! Client-side HTTP load balancing.
//!
//! A [`Transport`] picks a backend per request from a [`Balancer`], points
//! the request at it and forwards it through an [`Upstream`] HTTP client.
//! Backends are [`Connection`]s whose health is kept current by periodic
//! probes; unhealthy ones are skipped.
//!
//! ```no_run
//! use balancers::{HealthCheckConfig, RoundRobin, Transport};
//! use bytes::Bytes;
//! use http_body_util::Empty;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let balancer = RoundRobin::from_urls(
//!     ["http://10.0.0.1:9200", "http://10.0.0.2:9200"],
//!     &HealthCheckConfig::default(),
//! )
//! .await?;
//! let transport = Transport::with_default_upstream(balancer);
//!
//! // Sent to http://10.0.0.1:9200/_search?q=rust
//! let request = http::Request::get("/_search?q=rust").body(Empty::<Bytes>::new())?;
//! let response = transport.send(request).await?;
//! # drop(response);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod http;
pub mod load_balancer;
pub mod observability;

pub use config::{BalancerConfig, HealthCheckConfig};
pub use error::{BoxError, Error, Result};
pub use health::HealthState;
pub use self::http::{request_id, RequestId, Transport, Upstream};
pub use load_balancer::{Balancer, Connection, HttpConnection, RoundRobin, StaticConnection, Target};

//! Process-wide defaults.
//!
//! These are only defaults: every value here is threaded through
//! [`HealthCheckConfig`](crate::config::HealthCheckConfig) and can be
//! overridden per connection.

use std::time::Duration;

/// Current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default time between two health probes of a connection.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound for a single health probe, independent of the interval.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// User agent sent with every health probe, e.g. `balancers/0.1.0 (linux-x86_64)`.
pub fn default_user_agent() -> String {
    format!(
        "balancers/{} ({}-{})",
        VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

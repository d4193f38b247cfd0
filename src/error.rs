//! Error types surfaced to callers of the balancer and transport.

use thiserror::Error;

/// Boxed error used to carry upstream failures verbatim.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by balancers and the load-balancing transport.
#[derive(Debug, Error)]
pub enum Error {
    /// No member is currently usable (empty membership or all broken).
    #[error("no connection available")]
    NoConnection,

    /// A backend target could not be parsed at configuration time.
    #[error("invalid target {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    /// The rewritten authority or URI was malformed.
    #[error("invalid rewritten uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// The rewritten URI could not be assembled from its parts.
    #[error("invalid rewritten uri: {0}")]
    InvalidUriParts(#[from] http::uri::InvalidUriParts),

    /// The underlying transport failed. The source is passed through untouched.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] BoxError),
}

impl Error {
    /// Wrap an upstream failure.
    pub fn upstream<E: Into<BoxError>>(err: E) -> Self {
        Error::Upstream(err.into())
    }

    /// Return true if no connection could be selected.
    pub fn is_no_connection(&self) -> bool {
        matches!(self, Error::NoConnection)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

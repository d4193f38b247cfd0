//! Request identity and rewriting.
//!
//! # Responsibilities
//! - Attach a stable, process-unique ID to each request
//! - Copy the routing-independent parts of a request
//! - Rewrite scheme, host and user-info from a connection's target
//!
//! # Design Decisions
//! - IDs live in request extensions, not in headers; nothing leaks on the wire
//! - Path and query are never touched by a rewrite

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use http::request::Parts;
use http::uri::{Authority, PathAndQuery};
use http::{Request, Uri};

use crate::error::Result;
use crate::load_balancer::Target;

/// Global atomic counter for request IDs.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one request while it is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Generate a new unique request ID.
    pub fn new() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// ID attached to `request`, if any.
    pub fn of<B>(request: &Request<B>) -> Option<Self> {
        request.extensions().get::<RequestId>().copied()
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Return the request's ID, attaching a fresh one first if it has none.
///
/// Keep the returned value to cancel the request later.
pub fn request_id<B>(request: &mut Request<B>) -> RequestId {
    match RequestId::of(request) {
        Some(id) => id,
        None => {
            let id = RequestId::new();
            request.extensions_mut().insert(id);
            id
        }
    }
}

/// Copy method, URI, version, headers and extensions.
///
/// The header map is a separate copy: changing it never affects `parts`.
pub fn clone_parts(parts: &Parts) -> Parts {
    let (mut cloned, ()) = Request::new(()).into_parts();
    cloned.method = parts.method.clone();
    cloned.uri = parts.uri.clone();
    cloned.version = parts.version;
    cloned.headers = parts.headers.clone();
    cloned.extensions = parts.extensions.clone();
    cloned
}

/// Point `uri` at `target`.
///
/// Scheme, host and user-info are taken from the target when it has them
/// and kept from `uri` otherwise. Path and query are kept verbatim; a URI
/// without a path gets `/`.
pub fn rewrite_uri(uri: &Uri, target: &Target) -> Result<Uri> {
    let mut parts = uri.clone().into_parts();

    if let Some(scheme) = target.scheme() {
        parts.scheme = Some(scheme.clone());
    }

    let authority = {
        let (user_info, host) = split_authority(parts.authority.as_ref());
        let user_info = target.user_info().or(user_info);
        target.host().or(host).map(|host| match user_info {
            Some(user_info) => format!("{user_info}@{host}"),
            None => host.to_string(),
        })
    };
    if let Some(authority) = authority {
        parts.authority = Some(authority.parse::<Authority>()?);
    }

    if parts.authority.is_some() && parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }

    Ok(Uri::from_parts(parts)?)
}

/// Split `user:pwd@host:port` into user-info and host parts.
fn split_authority(authority: Option<&Authority>) -> (Option<&str>, Option<&str>) {
    let Some(authority) = authority else {
        return (None, None);
    };
    match authority.as_str().rsplit_once('@') {
        Some((user_info, host)) => (Some(user_info), Some(host)),
        None => (None, Some(authority.as_str())),
    }
}

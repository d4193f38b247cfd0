//! Load-balancing transport.
//!
//! # Responsibilities
//! - Ask the balancer for a connection per request
//! - Rewrite scheme, host and user-info of a copy of the request
//! - Forward the copy upstream and track it until its response is consumed
//! - Map caller-side cancellation to the rewritten request
//!
//! # Design Decisions
//! - Upstream failures are returned verbatim; nothing is retried here
//! - Dropping a pending `send` future releases its in-flight entry
//! - The in-flight table has a single lock per transport

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use hyper::body::Body;
use http::{Request, Response};
use tower::Service;

use crate::error::{BoxError, Error, Result};
use crate::http::body::TrackedBody;
use crate::http::in_flight::InFlight;
use crate::http::request::{clone_parts, request_id, rewrite_uri, RequestId};
use crate::http::upstream::{Cancel, HyperUpstream, Upstream};
use crate::load_balancer::Balancer;

struct Inner<U> {
    balancer: Arc<dyn Balancer>,
    upstream: U,
    in_flight: Arc<InFlight>,
}

/// Forwards each request to the connection its balancer picks.
///
/// Cheap to clone; clones share the balancer, upstream and in-flight table.
pub struct Transport<U> {
    inner: Arc<Inner<U>>,
}

impl<U> Transport<U> {
    pub fn new(balancer: impl Balancer + 'static, upstream: U) -> Self {
        Self {
            inner: Arc::new(Inner {
                balancer: Arc::new(balancer),
                upstream,
                in_flight: Arc::new(InFlight::new()),
            }),
        }
    }

    pub fn balancer(&self) -> &Arc<dyn Balancer> {
        &self.inner.balancer
    }

    pub fn upstream(&self) -> &U {
        &self.inner.upstream
    }

    /// Number of forwarded requests whose response is not yet consumed.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Send `request` through the next healthy connection.
    ///
    /// The request keeps its method, headers, body, path and query; only
    /// scheme, host and user-info are replaced. Attach an ID with
    /// [`request_id`](crate::http::request_id) beforehand to be able to
    /// [`cancel`](Self::cancel) it. The response extensions carry the
    /// [`Target`](crate::Target) that served it.
    pub async fn send<B>(
        &self,
        mut request: Request<B>,
    ) -> Result<Response<TrackedBody<<U as Upstream<B>>::Body>>>
    where
        U: Upstream<B>,
    {
        let conn = self.inner.balancer.get()?;

        let original = request_id(&mut request);
        let (parts, body) = request.into_parts();
        let mut rewritten = clone_parts(&parts);
        rewritten.uri = rewrite_uri(&parts.uri, conn.target())?;
        let upstream_id = RequestId::new();
        rewritten.extensions.insert(upstream_id);

        tracing::debug!(
            request_id = %original,
            upstream_id = %upstream_id,
            method = %rewritten.method,
            uri = %rewritten.uri,
            "Forwarding request"
        );

        let release = self.inner.in_flight.track(original, upstream_id);
        match self
            .inner
            .upstream
            .send(Request::from_parts(rewritten, body))
            .await
        {
            Ok(mut response) => {
                response.extensions_mut().insert(conn.target().clone());
                Ok(response.map(|body| TrackedBody::new(body, release)))
            }
            Err(e) => {
                drop(release);
                let e: BoxError = e.into();
                tracing::warn!(request_id = %original, target = %conn.target(), error = %e, "Upstream request failed");
                Err(Error::Upstream(e))
            }
        }
    }

    /// Cancel the request the caller knows as `request`.
    ///
    /// Forwards to the upstream's [`Cancel`] capability using the ID of the
    /// rewritten copy. A request that already completed, or was never sent,
    /// is ignored.
    pub fn cancel(&self, request: RequestId)
    where
        U: Cancel,
    {
        match self.inner.in_flight.get(request) {
            Some(upstream_id) => {
                tracing::debug!(request_id = %request, upstream_id = %upstream_id, "Canceling request");
                self.inner.upstream.cancel(upstream_id);
            }
            None => tracing::trace!(request_id = %request, "Cancel for request not in flight"),
        }
    }
}

impl<B> Transport<HyperUpstream<B>>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    /// Transport over a default [`HyperUpstream`].
    pub fn with_default_upstream(balancer: impl Balancer + 'static) -> Self {
        Self::new(balancer, HyperUpstream::new())
    }
}

impl<U> Clone for Transport<U> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<U: fmt::Debug> fmt::Debug for Transport<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("balancer", &self.inner.balancer)
            .field("upstream", &self.inner.upstream)
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

impl<U, B> Service<Request<B>> for Transport<U>
where
    U: Upstream<B>,
    B: Send + 'static,
{
    type Response = Response<TrackedBody<<U as Upstream<B>>::Body>>;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Self::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.send(request).await })
    }
}

//! The transport that actually executes rewritten requests.
//!
//! # Responsibilities
//! - Define what the load-balancing transport needs from an HTTP client
//! - Provide a hyper-util based default with request cancellation
//!
//! # Design Decisions
//! - A request stays cancelable until its response body ends, not only
//!   until the response head arrives
//! - URI user-info is sent as Basic authentication

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use dashmap::DashMap;
use hyper::body::{Body, Frame, Incoming, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use http::{Request, Response};
use thiserror::Error;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::BoxError;
use crate::http::auth::apply_basic_auth;
use crate::http::request::RequestId;

/// Optional capability of an upstream: abort a request it is executing.
///
/// The provided method does nothing, for upstreams that cannot cancel.
pub trait Cancel {
    fn cancel(&self, _request: RequestId) {}
}

/// Executes a request and returns the response.
///
/// The request carries its [`RequestId`] in its extensions; the same ID is
/// later passed to [`Cancel::cancel`].
pub trait Upstream<B>: Cancel + Send + Sync + 'static {
    type Body: Body + Send + 'static;
    type Error: Into<BoxError>;

    fn send(
        &self,
        request: Request<B>,
    ) -> impl Future<Output = Result<Response<Self::Body>, Self::Error>> + Send;
}

/// Failure of a [`HyperUpstream`] request or of its response body.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Http(#[from] hyper_util::client::legacy::Error),

    #[error("invalid request: {0}")]
    Request(http::Error),

    #[error("response body failed: {0}")]
    Body(hyper::Error),

    #[error("request canceled")]
    Canceled,
}

type Running = DashMap<RequestId, CancellationToken>;

/// Default upstream on hyper-util's pooled client.
///
/// Every request with a [`RequestId`] registers a cancellation token that
/// [`Cancel::cancel`] triggers. Canceling before the response head arrives
/// fails the send with [`UpstreamError::Canceled`]; canceling while the body
/// streams makes the body yield that error.
pub struct HyperUpstream<B> {
    client: Client<HttpConnector, B>,
    running: Arc<Running>,
}

impl<B> HyperUpstream<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    pub fn new() -> Self {
        Self::with_client(Client::builder(TokioExecutor::new()).build(HttpConnector::new()))
    }

    pub fn with_client(client: Client<HttpConnector, B>) -> Self {
        Self {
            client,
            running: Arc::new(DashMap::new()),
        }
    }

    /// Number of requests whose response has not finished.
    pub fn running(&self) -> usize {
        self.running.len()
    }
}

impl<B> Default for HyperUpstream<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for HyperUpstream<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperUpstream")
            .field("running", &self.running.len())
            .finish()
    }
}

impl<B> Cancel for HyperUpstream<B> {
    fn cancel(&self, request: RequestId) {
        if let Some((_, token)) = self.running.remove(&request) {
            token.cancel();
            tracing::debug!(upstream_id = %request, "Upstream request canceled");
        }
    }
}

/// Keeps a request's token registered; unregisters on drop.
struct Registration {
    running: Arc<Running>,
    id: RequestId,
}

impl Registration {
    fn new(running: &Arc<Running>, id: RequestId, token: CancellationToken) -> Self {
        running.insert(id, token);
        Self {
            running: Arc::clone(running),
            id,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.running.remove(&self.id);
    }
}

/// Response body of a [`HyperUpstream`] request.
///
/// Yields [`UpstreamError::Canceled`] once after its request is canceled and
/// ends there.
pub struct UpstreamBody {
    inner: Pin<Box<Incoming>>,
    cancellation: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    registration: Option<Registration>,
    canceled: bool,
}

impl UpstreamBody {
    fn new(inner: Incoming, token: CancellationToken, registration: Option<Registration>) -> Self {
        Self {
            inner: Box::pin(inner),
            cancellation: Some(Box::pin(token.cancelled_owned())),
            registration,
            canceled: false,
        }
    }

    fn finish(&mut self) {
        self.cancellation = None;
        self.registration = None;
    }
}

impl Body for UpstreamBody {
    type Data = Bytes;
    type Error = UpstreamError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, UpstreamError>>> {
        let this = self.get_mut();
        if this.canceled {
            return Poll::Ready(None);
        }
        if let Some(cancellation) = this.cancellation.as_mut() {
            if cancellation.as_mut().poll(cx).is_ready() {
                this.canceled = true;
                this.finish();
                return Poll::Ready(Some(Err(UpstreamError::Canceled)));
            }
        }

        let polled = this.inner.as_mut().poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.finish(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(),
            _ => {}
        }
        polled.map(|frame| frame.map(|result| result.map_err(UpstreamError::Body)))
    }

    fn is_end_stream(&self) -> bool {
        self.canceled || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        if self.canceled {
            SizeHint::with_exact(0)
        } else {
            self.inner.size_hint()
        }
    }
}

impl fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamBody")
            .field("request", &self.registration.as_ref().map(|r| r.id))
            .field("canceled", &self.canceled)
            .finish()
    }
}

impl<B> Upstream<B> for HyperUpstream<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Body = UpstreamBody;
    type Error = UpstreamError;

    fn send(
        &self,
        mut request: Request<B>,
    ) -> impl Future<Output = Result<Response<UpstreamBody>, UpstreamError>> + Send {
        let token = CancellationToken::new();
        let registration =
            RequestId::of(&request).map(|id| Registration::new(&self.running, id, token.clone()));
        let response = apply_basic_auth(&mut request).map(|()| self.client.request(request));

        async move {
            let response = response.map_err(UpstreamError::Request)?;
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = response => Some(result),
            };
            match outcome {
                None => Err(UpstreamError::Canceled),
                Some(result) => {
                    let response = result?;
                    Ok(response.map(|body| UpstreamBody::new(body, token, registration)))
                }
            }
        }
    }
}

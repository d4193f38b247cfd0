//! Response body that releases its in-flight entry.

use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::body::{Body, Frame, SizeHint};

use crate::http::in_flight::Release;
use crate::http::request::RequestId;

/// Wraps an upstream response body.
///
/// The in-flight entry of the request is released exactly once: when the
/// body reports end-of-stream or an error, or when the body is dropped
/// (closed) before that, whichever comes first.
#[derive(Debug)]
pub struct TrackedBody<B> {
    inner: Pin<Box<B>>,
    release: Option<Release>,
}

impl<B> TrackedBody<B> {
    pub(crate) fn new(inner: B, release: Release) -> Self {
        Self {
            inner: Box::pin(inner),
            release: Some(release),
        }
    }

    /// ID of the caller's request, until the body is released.
    pub fn request_id(&self) -> Option<RequestId> {
        self.release.as_ref().map(Release::original)
    }

    fn finish(&mut self) {
        self.release.take();
    }
}

impl<B: Body> Body for TrackedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = this.inner.as_mut().poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.finish(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for TrackedBody<B> {
    fn drop(&mut self) {
        self.finish();
    }
}

//! Response capture for the miss path.
//!
//! [`CaptureBody`] decorates the upstream response body: every frame is
//! forwarded to the client unchanged while data frames are copied into an
//! accumulator. When the body finishes, the completed [`CacheEntry`] is
//! handed to a completion callback for write-back. The client observes
//! identical bytes in identical order; the wrapper adds no buffering.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body::{Body, Frame, SizeHint};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Snapshot of a response as the upstream produced it.
///
/// Headers are flattened into ordered name/value pairs, one pair per value,
/// so repeated headers survive a round trip through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Bytes,
}

impl CacheEntry {
    pub fn new(status: StatusCode, headers: Vec<(String, Vec<u8>)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Flattens a header map into stored pairs, preserving per-name value
    /// order.
    pub fn headers_from_map(map: &HeaderMap) -> Vec<(String, Vec<u8>)> {
        map.iter()
            .map(|(name, value)| (name.as_str().to_owned(), value.as_bytes().to_vec()))
            .collect()
    }
}

type CompletionFn = Box<dyn FnOnce(CacheEntry) + Send>;

struct CaptureState {
    status: StatusCode,
    headers: Vec<(String, Vec<u8>)>,
    buf: BytesMut,
    on_complete: CompletionFn,
}

/// Body wrapper that forwards frames untouched while recording a copy.
///
/// In capturing mode the wrapper accumulates data frames and, once the inner
/// body reports end of stream, invokes the completion callback with the
/// finished entry. A mid-stream error or a body dropped before completion
/// discards the capture: partial responses are never handed to the callback.
pub struct CaptureBody<B> {
    inner: Pin<Box<B>>,
    capture: Option<CaptureState>,
}

impl<B> CaptureBody<B>
where
    B: Body<Data = Bytes>,
{
    /// Wraps a body without recording anything.
    ///
    /// Used on bypass and non-cacheable paths so every response flows
    /// through the same wrapper type.
    pub fn passthrough(inner: B) -> Self {
        Self {
            inner: Box::pin(inner),
            capture: None,
        }
    }

    /// Wraps a body, recording status, headers, and accumulated data frames.
    pub fn capturing(
        inner: B,
        status: StatusCode,
        headers: Vec<(String, Vec<u8>)>,
        on_complete: impl FnOnce(CacheEntry) + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(inner),
            capture: Some(CaptureState {
                status,
                headers,
                buf: BytesMut::new(),
                on_complete: Box::new(on_complete),
            }),
        }
    }
}

impl<B> Body for CaptureBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(state) = this.capture.as_mut() {
                    if let Some(data) = frame.data_ref() {
                        state.buf.extend_from_slice(data);
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                // A truncated body must not end up in the store.
                this.capture = None;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if let Some(state) = this.capture.take() {
                    let entry = CacheEntry::new(state.status, state.headers, state.buf.freeze());
                    (state.on_complete)(entry);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> fmt::Debug for CaptureBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureBody")
            .field("capturing", &self.capture.is_some())
            .finish()
    }
}

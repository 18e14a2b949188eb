//! Response relay: upstream response → client response.
//!
//! # Responsibilities
//! - Copy status and headers (minus framing) from the upstream response
//! - Stream the upstream body to the client chunk by chunk
//! - Turn an upstream body failure into a 502 while nothing has been sent,
//!   and into an aborted connection once bytes are on the wire
//!
//! # Design Decisions
//! - The first body chunk is awaited before the response head is returned.
//!   Until then the status can still change, so an early body failure is a
//!   clean 502 instead of a truncated 200.
//! - After that the body is pull-driven: the server polls `RelayStream` only
//!   when the client connection can take more data, so a slow client stops
//!   upstream reads instead of growing a buffer. At most one chunk is held.
//! - A body error is surfaced as `io::Error`; the server then closes the
//!   connection without completing the framing.
//! - Dropping the stream (client went away) drops the upstream response and
//!   releases its connection.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::Method;
use axum::response::Response;
use futures_util::stream::{BoxStream, Stream, StreamExt};

use crate::error::RelayError;
use crate::observability::metrics;
use crate::security::headers::relay_response_headers;

/// Build the client response for `upstream`.
pub async fn relay_response(
    upstream: reqwest::Response,
    method: &Method,
    request_id: &str,
) -> Result<Response, RelayError> {
    let status = upstream.status();
    let headers = relay_response_headers(upstream.headers());

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        let mut stream = upstream.bytes_stream().boxed();
        match stream.next().await {
            None => Body::empty(),
            Some(Err(e)) => return Err(RelayError::UpstreamBody(e)),
            Some(Ok(first)) => Body::from_stream(RelayStream::new(first, stream, request_id)),
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Upstream body adapter that tracks progress and maps failures.
pub struct RelayStream {
    first: Option<Bytes>,
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    relayed: u64,
    done: bool,
    request_id: String,
}

impl RelayStream {
    fn new(
        first: Bytes,
        inner: BoxStream<'static, reqwest::Result<Bytes>>,
        request_id: &str,
    ) -> Self {
        Self {
            first: Some(first),
            inner,
            relayed: 0,
            done: false,
            request_id: request_id.to_string(),
        }
    }

    fn forward(&mut self, chunk: Bytes) -> Poll<Option<io::Result<Bytes>>> {
        self.relayed += chunk.len() as u64;
        metrics::record_bytes_relayed(chunk.len());
        Poll::Ready(Some(Ok(chunk)))
    }
}

impl Stream for RelayStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if let Some(first) = self.first.take() {
            return self.forward(first);
        }

        match self.inner.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => self.forward(chunk),
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                metrics::record_stream_abort();
                tracing::warn!(
                    request_id = %self.request_id,
                    relayed_bytes = self.relayed,
                    error = %e,
                    "Upstream body failed mid-stream, aborting client connection"
                );
                Poll::Ready(Some(Err(io::Error::other(e))))
            }
            Poll::Ready(None) => {
                self.done = true;
                tracing::debug!(
                    request_id = %self.request_id,
                    relayed_bytes = self.relayed,
                    "Upstream body complete"
                );
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(
                request_id = %self.request_id,
                relayed_bytes = self.relayed,
                "Client went away, abandoning upstream body"
            );
        }
    }
}

//! Outbound dispatch.
//!
//! # Responsibilities
//! - Build the target URL (upstream origin + inbound path and query)
//! - Decide whether the inbound body travels upstream
//! - Issue exactly one request; no retries, no redirects followed
//!
//! # Design Decisions
//! - The inbound body is streamed, never buffered; a declared length is
//!   kept so the upstream sees `content-length` instead of chunked framing
//! - GET and HEAD bodies are discarded
//! - Any failure before response headers arrive is a single dispatch error

use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Method, Uri};
use http_body::{Frame, SizeHint};
use url::Url;

use crate::error::RelayError;
use crate::upstream::transport::Transport;

/// One outbound request, ready to send.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

impl OutboundRequest {
    /// Assemble the outbound request. The body is dropped for GET and HEAD.
    pub fn new(method: Method, origin: &Url, uri: &Uri, headers: HeaderMap, body: Body) -> Self {
        let body = carries_body(&method).then_some(body);
        Self {
            url: target_url(origin, uri),
            method,
            headers,
            body,
        }
    }
}

/// Whether a request with this method forwards its body.
pub fn carries_body(method: &Method) -> bool {
    !(method == Method::GET || method == Method::HEAD)
}

/// Join the inbound path and query onto the upstream origin.
///
/// The inbound path is absolute, so any path on the configured base URL is
/// replaced, exactly like resolving `/path?query` against the base.
pub fn target_url(origin: &Url, uri: &Uri) -> Url {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let mut url = origin.clone();
    url.set_fragment(None);
    match path_and_query.split_once('?') {
        Some((path, query)) => {
            url.set_path(path);
            url.set_query(Some(query));
        }
        None => {
            url.set_path(path_and_query);
            url.set_query(None);
        }
    }
    url
}

/// Inbound body handed to the outbound client.
///
/// The client requires `Sync` bodies; the mutex is never locked, only
/// reached through `&mut`. The size hint is captured up front.
pub struct InboundBody {
    inner: Mutex<Body>,
    size_hint: SizeHint,
}

impl InboundBody {
    pub fn new(body: Body) -> Self {
        Self {
            size_hint: body.size_hint(),
            inner: Mutex::new(body),
        }
    }
}

impl HttpBody for InboundBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let body = self
            .get_mut()
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        Pin::new(body).poll_frame(cx)
    }

    fn size_hint(&self) -> SizeHint {
        self.size_hint.clone()
    }
}

/// Send the request through the shared transport.
pub async fn dispatch(
    transport: &Transport,
    request: OutboundRequest,
) -> Result<reqwest::Response, RelayError> {
    let client = transport
        .client()
        .await
        .map_err(|e| RelayError::Transport(e.to_string()))?;

    let mut builder = client
        .request(request.method, request.url)
        .headers(request.headers);

    if let Some(body) = request.body {
        builder = builder.body(reqwest::Body::wrap(InboundBody::new(body)));
    }

    builder.send().await.map_err(RelayError::from_dispatch)
}

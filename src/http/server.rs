//! HTTP server setup and the per-request relay pipeline.
//!
//! # Responsibilities
//! - Create the axum Router with a catch-all route for every method
//! - Wire up middleware (tracing, request ID, body limit)
//! - Run the pipeline: config check → credential → headers → dispatch → relay
//! - Serve until the shutdown signal fires
//!
//! # Request States
//! ```text
//! Pending → CredentialResolved → Dispatched → StreamingBody → Completed
//!                                                          └→ AbortedMidStream
//!         └→ MissingCredential (401)     └→ DispatchFailed (502)
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::validation::upstream_origin;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::http::request::{request_id_middleware, RequestIdExt};
use crate::http::response::relay_response;
use crate::lifecycle::shutdown;
use crate::observability::logging::RedactedHeaders;
use crate::observability::metrics;
use crate::security::credentials::resolve_credential;
use crate::security::headers::{forward_headers, UserAgentPolicy};
use crate::security::limits::{body_limit_layer, parse_body_limit};
use crate::upstream::dispatch::{dispatch, OutboundRequest};
use crate::upstream::transport::Transport;

/// Used when the configured limit cannot be parsed.
const FALLBACK_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub transport: Arc<Transport>,
    pub user_agent: Arc<UserAgentPolicy>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let transport = Transport::new(config.socks.clone(), &config.timeouts);
        let user_agent = UserAgentPolicy::from_config(&config.headers);
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            user_agent: Arc::new(user_agent),
        }
    }
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: Arc<RelayConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        if let Err(e) = upstream_origin(&config.upstream) {
            tracing::warn!(error = %e, "Upstream origin is invalid; every request will fail until fixed");
        }

        let state = AppState::new(config);
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let body_limit = parse_body_limit(&config.limits.body_limit).unwrap_or_else(|| {
            tracing::warn!(
                body_limit = %config.limits.body_limit,
                "Unparseable body limit, using 25mb"
            );
            FALLBACK_BODY_LIMIT
        });

        Router::new()
            .route("/", any(relay_handler))
            .route("/{*path}", any(relay_handler))
            .with_state(state)
            .layer(body_limit_layer(body_limit))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// A clone of the fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. In-flight requests are allowed to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            socks_enabled = self.config.socks.enabled,
            "Relay listening"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Catch-all handler: every method, every path.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request
        .request_id()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string());
    let method = request.method().clone();

    let span = tracing::info_span!(
        "relay",
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
    );

    let response = relay(&state, request, &request_id)
        .instrument(span)
        .await
        .unwrap_or_else(IntoResponse::into_response);

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn relay(
    state: &AppState,
    request: Request<Body>,
    request_id: &str,
) -> Result<Response, RelayError> {
    let origin = upstream_origin(&state.config.upstream)?;
    let (parts, body) = request.into_parts();

    if state.config.observability.log_headers {
        tracing::debug!(headers = %RedactedHeaders(&parts.headers), "Inbound headers");
    }

    let (credential, source) = resolve_credential(
        &parts.headers,
        state.config.upstream.fallback_token.as_deref(),
    )
    .ok_or(RelayError::MissingCredential)?;
    tracing::debug!(credential_source = source.as_str(), "Credential resolved");

    let headers = forward_headers(&parts.headers, &credential, &state.user_agent);
    let outbound = OutboundRequest::new(parts.method.clone(), &origin, &parts.uri, headers, body);
    tracing::debug!(target_url = %outbound.url, "Dispatching upstream");

    let upstream = dispatch(&state.transport, outbound).await?;
    tracing::debug!(status = upstream.status().as_u16(), "Upstream responded");

    relay_response(upstream, &parts.method, request_id).await
}

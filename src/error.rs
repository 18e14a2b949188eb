//! Per-request failure taxonomy.
//!
//! Every variant maps to a complete JSON error response. Failures after the
//! response head has been sent are not represented here; the relay body aborts
//! the connection instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::config::validation::ValidationError;
use crate::security::limits::is_length_limit_error;

/// Errors that end a request with a clean error response.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The upstream origin is missing or unusable.
    #[error("{0}")]
    Config(#[from] ValidationError),

    /// No credential in the request and no fallback configured.
    #[error("Missing API token.")]
    MissingCredential,

    /// The inbound body exceeded the configured limit while streaming.
    #[error("Request body too large.")]
    PayloadTooLarge,

    /// The shared transport could not be built.
    #[error("transport unavailable: {0}")]
    Transport(String),

    /// DNS, connect, TLS, timeout or reset before response headers arrived.
    #[error("upstream unreachable: {0}")]
    Dispatch(#[source] reqwest::Error),

    /// The upstream body failed before any byte reached the client.
    #[error("upstream body failed: {0}")]
    UpstreamBody(#[source] reqwest::Error),
}

impl RelayError {
    /// Classify a send failure; body-limit violations are the client's fault.
    pub fn from_dispatch(err: reqwest::Error) -> Self {
        if is_length_limit_error(&err) {
            RelayError::PayloadTooLarge
        } else {
            RelayError::Dispatch(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Config(_) | RelayError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::MissingCredential => StatusCode::UNAUTHORIZED,
            RelayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Dispatch(_) | RelayError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show the client. Upstream detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            RelayError::Dispatch(_) | RelayError::UpstreamBody(_) => {
                "Upstream request failed.".to_string()
            }
            RelayError::Transport(_) => "Upstream transport unavailable.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

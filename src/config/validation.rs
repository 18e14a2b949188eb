//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value formats (body limit, proxy URL, metrics address)
//! - Resolve the upstream origin, which is re-checked on every request
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - A bad upstream URL is not fatal at startup; it surfaces as a 500 per request

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::{RelayConfig, UpstreamConfig};
use crate::security::limits::parse_body_limit;
use crate::upstream::socks::SocksProxy;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid body limit {0:?}")]
    BodyLimit(String),

    #[error("invalid SOCKS proxy configuration: {0}")]
    Socks(String),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("fallback token contains characters not allowed in a header")]
    FallbackToken,

    #[error("Missing ANTHROPIC_BASE_URL environment variable.")]
    MissingUpstream,

    #[error("invalid upstream base URL {0:?}")]
    UpstreamUrl(String),
}

/// Validate everything that must be sound before the server starts.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if parse_body_limit(&config.limits.body_limit).is_none() {
        errors.push(ValidationError::BodyLimit(config.limits.body_limit.clone()));
    }

    if let Some(token) = &config.upstream.fallback_token {
        if HeaderValue::from_str(token).is_err() {
            errors.push(ValidationError::FallbackToken);
        }
    }

    if config.socks.enabled {
        if let Err(e) = SocksProxy::from_config(&config.socks) {
            errors.push(ValidationError::Socks(e.to_string()));
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Resolve the upstream origin. Only `http` and `https` origins are accepted.
pub fn upstream_origin(upstream: &UpstreamConfig) -> Result<Url, ValidationError> {
    let raw = upstream.base_url.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingUpstream);
    }

    let url = Url::parse(raw).map_err(|_| ValidationError::UpstreamUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ValidationError::UpstreamUrl(raw.to_string())),
    }
}

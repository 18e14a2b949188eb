//! Header rewriting in both directions.
//!
//! # Responsibilities
//! - Build the outbound header set from the inbound one
//! - Replace client identity (user-agent) when it looks scripted
//! - Inject the resolved credential and force identity encoding
//! - Filter framing headers out of upstream responses
//!
//! # Design Decisions
//! - Denylisted keys are dropped wholesale, never merged with inbound values
//! - Repeated inbound headers are merged into one comma-joined value
//!   (`cookie` joins with "; ")
//! - Pure functions; nothing here touches the network

use axum::http::header::{
    self, HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, USER_AGENT,
};

use crate::config::HeaderPolicyConfig;
use crate::security::credentials::{Credential, X_API_KEY};

/// Inbound headers never copied to the upstream request.
const DROPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "authorization",
    X_API_KEY,
    "via",
    "user-agent",
];

const FORWARDED_PREFIX: &str = "x-forwarded-";

/// Decides which user-agent the upstream sees.
#[derive(Debug, Clone)]
pub struct UserAgentPolicy {
    default: HeaderValue,
    markers: Vec<String>,
}

impl UserAgentPolicy {
    pub fn new(default: &str, markers: &[String]) -> Self {
        let default = HeaderValue::from_str(default)
            .unwrap_or_else(|_| HeaderValue::from_static(crate::config::DEFAULT_USER_AGENT));
        Self {
            default,
            markers: markers.iter().map(|m| m.to_ascii_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &HeaderPolicyConfig) -> Self {
        Self::new(&config.default_user_agent, &config.scripted_user_agent_markers)
    }

    /// The inbound value when it looks like a browser, else the default.
    pub fn sanitize(&self, inbound: Option<&HeaderValue>) -> HeaderValue {
        let Some(value) = inbound else {
            return self.default.clone();
        };
        let lowered = String::from_utf8_lossy(value.as_bytes()).to_lowercase();
        if lowered.is_empty() || self.markers.iter().any(|m| lowered.contains(m.as_str())) {
            self.default.clone()
        } else {
            value.clone()
        }
    }
}

impl Default for UserAgentPolicy {
    fn default() -> Self {
        Self::from_config(&HeaderPolicyConfig::default())
    }
}

/// True for inbound header names that are recomputed or dropped.
pub fn is_dropped_request_header(name: &HeaderName) -> bool {
    let name = name.as_str();
    DROPPED_REQUEST_HEADERS.contains(&name) || name.starts_with(FORWARDED_PREFIX)
}

/// Build the outbound header map for one request.
pub fn forward_headers(
    inbound: &HeaderMap,
    credential: &Credential,
    user_agent: &UserAgentPolicy,
) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.keys_len() + 3);

    for name in inbound.keys() {
        if is_dropped_request_header(name) {
            continue;
        }
        if let Some(value) = merged_value(inbound, name) {
            outbound.insert(name.clone(), value);
        }
    }

    outbound.insert(USER_AGENT, user_agent.sanitize(inbound.get(USER_AGENT)));
    outbound.insert(HeaderName::from_static(X_API_KEY), credential.expose().clone());
    outbound.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    outbound
}

fn merged_value(headers: &HeaderMap, name: &HeaderName) -> Option<HeaderValue> {
    let mut values = headers.get_all(name).iter();
    let first = values.next()?;
    let rest: Vec<&HeaderValue> = values.collect();
    if rest.is_empty() {
        return Some(first.clone());
    }

    let separator: &[u8] = if name == header::COOKIE { b"; " } else { b", " };
    let mut joined = first.as_bytes().to_vec();
    for value in rest {
        joined.extend_from_slice(separator);
        joined.extend_from_slice(value.as_bytes());
    }
    HeaderValue::from_bytes(&joined).ok()
}

/// Copy upstream response headers, minus framing the server recomputes.
pub fn relay_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(upstream.keys_len());
    for (name, value) in upstream {
        if name == header::TRANSFER_ENCODING || name == header::CONTENT_LENGTH {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }
    relayed
}

//! Outbound credential resolution.
//!
//! Resolution order, first non-empty wins:
//! 1. `x-api-key` request header (trimmed)
//! 2. `authorization: Bearer <token>` request header (token trimmed)
//! 3. the configured fallback token
//!
//! Only the first value of a repeated header is considered.

use std::fmt;

use axum::http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

/// Per-request API key header.
pub const X_API_KEY: &str = "x-api-key";

/// Opaque bearer token injected into the outbound request.
///
/// Held as raw header bytes so tokens with obs-text survive unchanged.
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(HeaderValue);

impl Credential {
    /// `None` when `token` cannot travel in a header.
    pub fn from_bytes(token: &[u8]) -> Option<Self> {
        let mut value = HeaderValue::from_bytes(token).ok()?;
        value.set_sensitive(true);
        Some(Self(value))
    }

    /// The raw token. Only the header transformer should need this.
    pub fn expose(&self) -> &HeaderValue {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Where the resolved credential came from. Safe to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ApiKeyHeader,
    BearerAuthorization,
    Fallback,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::ApiKeyHeader => "x-api-key",
            CredentialSource::BearerAuthorization => "authorization",
            CredentialSource::Fallback => "fallback",
        }
    }
}

/// Resolve the outbound credential, or `None` when the request must be
/// rejected as unauthenticated.
pub fn resolve_credential(
    headers: &HeaderMap,
    fallback: Option<&str>,
) -> Option<(Credential, CredentialSource)> {
    if let Some(key) = first_value(headers, X_API_KEY).map(<[u8]>::trim_ascii) {
        if let Some(credential) = non_empty(key) {
            return Some((credential, CredentialSource::ApiKeyHeader));
        }
    }

    if let Some(credential) = first_value(headers, AUTHORIZATION.as_str())
        .and_then(bearer_token)
        .and_then(non_empty)
    {
        return Some((credential, CredentialSource::BearerAuthorization));
    }

    fallback
        .and_then(|token| non_empty(token.as_bytes()))
        .map(|credential| (credential, CredentialSource::Fallback))
}

fn non_empty(token: &[u8]) -> Option<Credential> {
    if token.is_empty() {
        None
    } else {
        Credential::from_bytes(token)
    }
}

/// Raw bytes of the first value of `name`.
fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a [u8]> {
    headers.get(name).map(HeaderValue::as_bytes)
}

/// Extract `<token>` from `Bearer <token>` (scheme case-insensitive, at least
/// one whitespace separator, non-empty token).
fn bearer_token(value: &[u8]) -> Option<&[u8]> {
    let split = value.iter().position(u8::is_ascii_whitespace)?;
    let (scheme, rest) = value.split_at(split);
    if !scheme.eq_ignore_ascii_case(b"bearer") {
        return None;
    }
    let token = rest.trim_ascii();
    (!token.is_empty()).then_some(token)
}

//! SOCKS5 tunnel endpoint.
//!
//! The endpoint is taken verbatim from `socks.url` when present, otherwise it
//! is assembled from host, port and optional credentials. Credentials are
//! percent-encoded by `url`.

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::config::SocksConfig;

/// Errors building the tunnel endpoint.
#[derive(Debug, Error)]
pub enum SocksError {
    #[error("invalid proxy URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported proxy scheme {0:?} (expected socks5 or socks5h)")]
    Scheme(String),

    #[error("proxy URL has no host")]
    MissingHost,

    #[error("proxy credentials could not be encoded")]
    Credentials,

    #[error("transport rejected proxy: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Immutable description of the SOCKS5 endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct SocksProxy {
    url: Url,
}

impl SocksProxy {
    /// Build from configuration, ignoring the `enabled` flag.
    pub fn from_config(config: &SocksConfig) -> Result<Self, SocksError> {
        let url = match config.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(raw) => Url::parse(raw)?,
            None => Self::assemble(config)?,
        };

        if !matches!(url.scheme(), "socks5" | "socks5h") {
            return Err(SocksError::Scheme(url.scheme().to_string()));
        }
        if !url.has_host() {
            return Err(SocksError::MissingHost);
        }

        Ok(Self { url })
    }

    fn assemble(config: &SocksConfig) -> Result<Url, SocksError> {
        let mut url = Url::parse(&format!("socks5h://{}:{}", config.host, config.port))?;
        if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
            url.set_username(username)
                .map_err(|_| SocksError::Credentials)?;
            if let Some(password) = config.password.as_deref() {
                url.set_password(Some(password))
                    .map_err(|_| SocksError::Credentials)?;
            }
        }
        Ok(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host:port` of the endpoint, for logs.
    pub fn endpoint(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.url.host_str().unwrap_or_default(), port),
            None => self.url.host_str().unwrap_or_default().to_string(),
        }
    }

    /// Convert into the transport's proxy setting, applied to every scheme.
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy, SocksError> {
        Ok(reqwest::Proxy::all(self.url.as_str())?)
    }
}

impl fmt::Debug for SocksProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocksProxy")
            .field("scheme", &self.url.scheme())
            .field("endpoint", &self.endpoint())
            .field("authenticated", &!self.url.username().is_empty())
            .finish()
    }
}

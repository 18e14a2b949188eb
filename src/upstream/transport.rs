//! Process-wide outbound transport.
//!
//! Both the SOCKS endpoint and the HTTP client are built lazily on first use
//! and then shared read-only by every request. `tokio::sync::OnceCell` gives
//! single-flight initialization: concurrent first requests wait on one
//! construction instead of racing to build duplicates. A failed build leaves
//! the cell empty so the next request retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::config::{SocksConfig, TimeoutConfig};
use crate::upstream::socks::{SocksError, SocksProxy};

/// Lazily constructed outbound client plus its tunnel settings.
#[derive(Debug)]
pub struct Transport {
    socks_config: SocksConfig,
    connect_timeout: Duration,
    proxy: OnceCell<Option<Arc<SocksProxy>>>,
    client: OnceCell<reqwest::Client>,
}

impl Transport {
    pub fn new(socks_config: SocksConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            socks_config,
            connect_timeout: Duration::from_secs(timeouts.connect_secs),
            proxy: OnceCell::new(),
            client: OnceCell::new(),
        }
    }

    /// The tunnel endpoint, or `None` when tunnelling is disabled.
    pub async fn proxy(&self) -> Result<Option<Arc<SocksProxy>>, SocksError> {
        self.proxy
            .get_or_try_init(|| async {
                if !self.socks_config.enabled {
                    tracing::info!("SOCKS tunnel disabled, connecting to upstream directly");
                    return Ok::<_, SocksError>(None);
                }
                let proxy = SocksProxy::from_config(&self.socks_config)?;
                tracing::info!(proxy = ?proxy, "SOCKS tunnel configured");
                Ok(Some(Arc::new(proxy)))
            })
            .await
            .cloned()
    }

    /// The shared HTTP client. Never follows redirects and never decompresses.
    pub async fn client(&self) -> Result<&reqwest::Client, SocksError> {
        self.client
            .get_or_try_init(|| async {
                let proxy = self.proxy().await?;
                let mut builder = reqwest::Client::builder()
                    .redirect(reqwest::redirect::Policy::none())
                    .connect_timeout(self.connect_timeout);

                builder = match proxy {
                    Some(proxy) => builder.proxy(proxy.to_reqwest()?),
                    // Ignore HTTP(S)_PROXY from the environment as well.
                    None => builder.no_proxy(),
                };

                let client = builder.build()?;
                tracing::debug!("Upstream transport initialized");
                Ok::<_, SocksError>(client)
            })
            .await
    }
}

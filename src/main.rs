//! api-relay
//!
//! Forwards every inbound HTTP request to one fixed upstream API, swapping in
//! the resolved API key and a sanitized header set, and streams the upstream
//! response back unchanged.
//!
//! ```text
//!   client ──▶ request id ─▶ body limit ─▶ credential ─▶ header rewrite ─┐
//!                                                                        ▼
//!   client ◀── streamed body ◀── status + headers ◀── upstream (direct or SOCKS5)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_relay::config::load_config;
use api_relay::lifecycle::signals::shutdown_on_signal;
use api_relay::observability::{logging, metrics};
use api_relay::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "api-relay")]
#[command(about = "Single-upstream HTTP API relay", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let cli = Cli::parse();

    tracing::info!("api-relay v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        upstream = %config.upstream.base_url,
        fallback_token = config.upstream.fallback_token.is_some(),
        body_limit = %config.limits.body_limit,
        socks_enabled = config.socks.enabled,
        "Configuration loaded"
    );

    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(metrics_address = %addr, error = %e, "Failed to parse metrics address"),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let signalled = tokio::select! {
        result = &mut server_task => {
            result??;
            false
        }
        _ = shutdown_on_signal(&shutdown) => true,
    };
    if signalled {
        server_task.await??;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

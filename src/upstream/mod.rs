//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! OutboundRequest
//!     → transport.rs (shared client, built once)
//!         → socks.rs (optional SOCKS5 tunnel, built once)
//!     → dispatch.rs (single send, no redirects, no retries)
//!     → reqwest::Response handed to the relay
//! ```

pub mod dispatch;
pub mod socks;
pub mod transport;

pub use dispatch::{dispatch, OutboundRequest};
pub use socks::SocksProxy;
pub use transport::Transport;

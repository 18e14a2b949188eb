//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → optional TOML file (loader.rs)
//!     → environment overlay (loader.rs)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc to the request pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - The upstream origin is re-resolved per request so a bad value yields
//!   a 500 response instead of a boot failure

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, load_config, ConfigError};
pub use schema::{
    HeaderPolicyConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, RelayConfig,
    SocksConfig, TimeoutConfig, UpstreamConfig, DEFAULT_USER_AGENT,
};

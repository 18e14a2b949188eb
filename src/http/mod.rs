//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware, relay pipeline)
//!     → request.rs (request ID)
//!     → [security: credential + header rewrite]
//!     → [upstream: dispatch]
//!     → response.rs (status/header copy, streamed body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};

//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (body size limit)
//!     → credentials.rs (resolve outbound token)
//!     → headers.rs (drop/rewrite headers, inject token)
//!     → Pass to dispatch
//! ```
//!
//! # Design Decisions
//! - No trust in client-supplied forwarding headers
//! - Client credentials are replaced, never merged
//! - Fail closed: no credential means no outbound traffic

pub mod credentials;
pub mod headers;
pub mod limits;

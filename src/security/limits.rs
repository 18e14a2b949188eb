//! Request size limits.
//!
//! # Responsibilities
//! - Parse human-readable size limits ("25mb", "512kb", "1048576")
//! - Build the inbound body-limit layer
//! - Recognize a limit violation inside a transport error chain

use std::error::Error as StdError;

use http_body_util::LengthLimitError;
use tower_http::limit::RequestBodyLimitLayer;

/// Parse a size limit. Units are 1024-based and case-insensitive; a bare
/// number is a byte count.
pub fn parse_body_limit(raw: &str) -> Option<usize> {
    let raw = raw.trim().to_ascii_lowercase();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);

    let multiplier: f64 = match unit.trim() {
        "" | "b" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier).floor() as usize)
}

/// Layer rejecting bodies above `limit` bytes.
///
/// A declared `content-length` over the limit is answered with 413 before the
/// handler runs; streamed bodies fail when the limit is crossed.
pub fn body_limit_layer(limit: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(limit)
}

/// True when `err`, or anything in its source chain, is a body-limit violation.
pub fn is_length_limit_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

//! Sender error classification.
//!
//! Decides whether a failed attempt is worth retrying. Transient: timeouts,
//! network and connection failures, rate limiting, provider 5xx responses and
//! anything explicitly marked temporary. Everything else is permanent.
//!
//! An `HTTP <code>` status decides on its own; the provider body that follows
//! it is never scanned for markers.

use serde::Serialize;

/// Whether a failure is expected to clear on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Transient,
    Permanent,
}

const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "connection",
    "rate limit",
    "too many requests",
    "5xx",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
    "temporar",
];

/// Classify a sender error message.
pub fn classify(error: &str) -> ErrorClass {
    let lower = error.to_ascii_lowercase();

    match http_status(&lower) {
        Some(429) | Some(500..=599) => ErrorClass::Transient,
        Some(_) => ErrorClass::Permanent,
        None if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) => {
            ErrorClass::Transient
        }
        None => ErrorClass::Permanent,
    }
}

/// Status code from an `HTTP <code>` fragment, if present.
fn http_status(lower: &str) -> Option<u16> {
    let (_, rest) = lower.split_once("http ")?;
    let code: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

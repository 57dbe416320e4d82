//! Error text for provider HTTP calls.
//!
//! The worker classifies failures from their text, so transport errors and
//! status codes are rendered in a fixed shape: `timeout: ...`,
//! `network error: ...`, `HTTP 503 Service Unavailable: ...`.

use reqwest::StatusCode;

/// Longest provider response body kept in an error message.
const MAX_BODY_CHARS: usize = 300;

pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {}", err)
    } else if err.is_connect() || err.is_request() {
        format!("network error: {}", err)
    } else if err.is_decode() {
        format!("invalid provider response: {}", err)
    } else {
        format!("network error: {}", err)
    }
}

pub(crate) fn describe_status(status: StatusCode, body: &str) -> String {
    let body: String = body.chars().take(MAX_BODY_CHARS).collect();
    let reason = status.canonical_reason().unwrap_or("");
    if status == StatusCode::TOO_MANY_REQUESTS {
        format!("HTTP {} rate limit exceeded: {}", status.as_u16(), body)
    } else {
        format!("HTTP {} {}: {}", status.as_u16(), reason, body)
    }
}

//! Translation of admission outcomes into HTTP responses.
//!
//! Framework adapters call into this module so every denial looks the same
//! on the wire: status 429, the `X-RateLimit-*` header set, `Retry-After`,
//! and a small JSON body. Allowed requests produce no response here; the
//! adapter lets the request continue and may attach the quota headers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ratelimit::RateLimitResult;

/// JSON body returned with every 429.
#[derive(Debug, Serialize)]
pub struct RateLimitedBody {
    /// Stable machine-readable code, always `"rate_limited"`
    pub error: &'static str,
    /// Human-readable explanation
    pub message: String,
    /// Seconds until retry is worthwhile
    #[serde(rename = "retryAfter")]
    pub retry_after: u64,
    /// When the current window or ban ends, epoch seconds
    #[serde(rename = "resetAt")]
    pub reset_at: u64,
}

/// Quota headers attached to every admission response, allowed or denied.
pub fn quota_headers(limit: u64, result: &RateLimitResult) -> [(&'static str, String); 3] {
    [
        ("X-RateLimit-Limit", limit.to_string()),
        ("X-RateLimit-Remaining", result.remaining.to_string()),
        ("X-RateLimit-Reset", result.reset_at.to_string()),
    ]
}

/// Build the standard 429 response for a denial.
pub fn too_many_requests(
    limit: u64,
    result: &RateLimitResult,
    message: impl Into<String>,
) -> Response {
    let retry_after = result.retry_after.unwrap_or(0);
    (
        StatusCode::TOO_MANY_REQUESTS,
        quota_headers(limit, result),
        [("Retry-After", retry_after.to_string())],
        Json(RateLimitedBody {
            error: "rate_limited",
            message: message.into(),
            retry_after,
            reset_at: result.reset_at,
        }),
    )
        .into_response()
}

/// Express an active ban as a denial so it shares the 429 translation.
pub fn ban_result(ban_remaining: u64, now: u64) -> RateLimitResult {
    RateLimitResult {
        allowed: false,
        remaining: 0,
        reset_at: now + ban_remaining,
        retry_after: Some(ban_remaining),
    }
}

/// Default denial message for an exhausted window.
pub fn limit_message(result: &RateLimitResult) -> String {
    format!(
        "Rate limit exceeded. Try again in {} seconds.",
        result.retry_after.unwrap_or(0)
    )
}

/// Default denial message for an active ban.
pub fn ban_message(ban_remaining: u64) -> String {
    format!(
        "Temporarily banned for repeated violations. Try again in {} seconds.",
        ban_remaining
    )
}

//! Admission API handlers.
//!
//! Thin adapter glue between HTTP and the engine: extract the endpoint and
//! identifier from the request, consult the policy set, and render the
//! decision. All denial rendering goes through
//! [`response`](super::response) so every call site speaks the same 429.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::abuse::AbuseTracker;
use crate::ratelimit::{unix_now, PolicySet, RateLimitResult, RateLimiter};

use super::response::{
    ban_message, ban_result, limit_message, quota_headers, too_many_requests,
};

/// Shared application state, constructed once at startup.
pub struct AppState {
    pub limiter: RateLimiter,
    pub abuse: AbuseTracker,
    pub policies: PolicySet,
    /// Escape hatch: when false, every check allows without touching the store
    pub enforce: bool,
}

/// Error response body for rejected or failed API calls.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn bad_request(error: &'static str, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Admission check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Logical endpoint name, must match a configured policy
    pub endpoint: String,
    /// Caller identity (user id, IP, API key hash)
    pub identifier: String,
}

/// Admission check reply on allow.
#[derive(Debug, Serialize)]
struct CheckReply {
    allowed: bool,
    remaining: u64,
    #[serde(rename = "resetAt")]
    reset_at: u64,
}

/// Violation report request.
#[derive(Debug, Deserialize)]
pub struct ViolationRequest {
    pub identifier: String,
}

/// Abuse state reply.
#[derive(Debug, Serialize)]
struct AbuseReply {
    violations: u64,
    banned: bool,
    #[serde(rename = "banRemaining")]
    ban_remaining: u64,
    #[serde(rename = "bannedUntil", skip_serializing_if = "Option::is_none")]
    banned_until: Option<u64>,
}

/// Health check endpoint.
pub async fn health() -> Json<impl Serialize> {
    Json(HealthResponse {
        status: "healthy",
        service: "gateward",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Check and consume quota for one request.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Response {
    if req.endpoint.is_empty() {
        warn!("Received admission check with empty endpoint");
        return bad_request("invalid_request", "endpoint is required");
    }
    if req.identifier.is_empty() {
        warn!(endpoint = %req.endpoint, "Received admission check with empty identifier");
        return bad_request("invalid_request", "identifier is required");
    }

    let Some(policy) = state.policies.get(&req.endpoint) else {
        warn!(endpoint = %req.endpoint, "No policy configured for endpoint");
        return bad_request("unknown_endpoint", format!("no policy for {:?}", req.endpoint));
    };

    if !state.enforce {
        debug!(endpoint = %req.endpoint, "Enforcement disabled, admitting");
        let result = RateLimitResult {
            allowed: true,
            remaining: policy.limit,
            reset_at: unix_now() + policy.window_seconds,
            retry_after: None,
        };
        return allow_response(policy.limit, &result);
    }

    // Banned identifiers are refused before any quota is spent on them.
    if policy.check_ban {
        let now = unix_now();
        let abuse_state = state.abuse.get_state(&req.identifier).await;
        if abuse_state.is_banned_at(now) {
            let remaining = abuse_state.ban_remaining_at(now);
            info!(
                endpoint = %req.endpoint,
                identifier = %req.identifier,
                ban_remaining = remaining,
                "Refusing banned identifier"
            );
            return too_many_requests(
                policy.limit,
                &ban_result(remaining, now),
                ban_message(remaining),
            );
        }
    }

    let opts = policy.check_options(&req.endpoint, &req.identifier);
    let result = state.limiter.check(&opts).await;

    debug!(
        endpoint = %req.endpoint,
        identifier = %req.identifier,
        allowed = result.allowed,
        remaining = result.remaining,
        "Admission decision made"
    );

    if result.allowed {
        allow_response(policy.limit, &result)
    } else {
        too_many_requests(policy.limit, &result, limit_message(&result))
    }
}

fn allow_response(limit: u64, result: &RateLimitResult) -> Response {
    (
        StatusCode::OK,
        quota_headers(limit, result),
        Json(CheckReply {
            allowed: true,
            remaining: result.remaining,
            reset_at: result.reset_at,
        }),
    )
        .into_response()
}

/// Count a violation against an identifier.
pub async fn record_violation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ViolationRequest>,
) -> Response {
    if req.identifier.is_empty() {
        warn!("Received violation report with empty identifier");
        return bad_request("invalid_request", "identifier is required");
    }

    let outcome = state.abuse.record_violation(&req.identifier).await;
    (StatusCode::OK, Json(outcome)).into_response()
}

/// Read an identifier's abuse state.
pub async fn get_abuse(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Response {
    let now = unix_now();
    let abuse_state = state.abuse.get_state(&identifier).await;

    (
        StatusCode::OK,
        Json(AbuseReply {
            violations: abuse_state.violations,
            banned: abuse_state.is_banned_at(now),
            ban_remaining: abuse_state.ban_remaining_at(now),
            banned_until: abuse_state.banned_until,
        }),
    )
        .into_response()
}

/// Delete an identifier's abuse state (manual unban).
pub async fn clear_abuse(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Response {
    match state.abuse.clear(&identifier).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(identifier = %identifier, error = %e, "Failed to clear abuse state");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "store_unavailable",
                    message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn test_state(policies_yaml: &str, enforce: bool) -> Arc<AppState> {
        let store = Arc::new(MemoryStore::new());
        Arc::new(AppState {
            limiter: RateLimiter::new(store.clone()),
            abuse: AbuseTracker::new(store),
            policies: PolicySet::from_yaml(policies_yaml).unwrap(),
            enforce,
        })
    }

    const POLICIES: &str = r#"
endpoints:
  posts/create:
    limit: 5
    window_seconds: 3600
  moderation/report:
    limit: 10
    window_seconds: 3600
    check_ban: true
"#;

    #[tokio::test]
    async fn test_check_allows_until_limit_then_429() {
        let state = test_state(POLICIES, true);

        for _ in 0..5 {
            let response = check(
                State(state.clone()),
                Json(CheckRequest {
                    endpoint: "posts/create".to_string(),
                    identifier: "user-1".to_string(),
                }),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = check(
            State(state),
            Json(CheckRequest {
                endpoint: "posts/create".to_string(),
                identifier: "user-1".to_string(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["X-RateLimit-Remaining"], "0");
        assert!(headers["Retry-After"].to_str().unwrap().parse::<u64>().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_check_attaches_quota_headers_on_allow() {
        let state = test_state(POLICIES, true);

        let response = check(
            State(state),
            Json(CheckRequest {
                endpoint: "posts/create".to_string(),
                identifier: "user-1".to_string(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["X-RateLimit-Limit"], "5");
        assert_eq!(headers["X-RateLimit-Remaining"], "4");
        assert!(headers.contains_key("X-RateLimit-Reset"));
        assert!(!headers.contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn test_check_rejects_empty_fields() {
        let state = test_state(POLICIES, true);

        let response = check(
            State(state.clone()),
            Json(CheckRequest {
                endpoint: String::new(),
                identifier: "user-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = check(
            State(state),
            Json(CheckRequest {
                endpoint: "posts/create".to_string(),
                identifier: String::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_rejects_unknown_endpoint() {
        let state = test_state(POLICIES, true);

        let response = check(
            State(state),
            Json(CheckRequest {
                endpoint: "nope".to_string(),
                identifier: "user-1".to_string(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_enforcement_escape_hatch_admits_everything() {
        let state = test_state(POLICIES, false);

        // Far past the limit of 5, still admitted.
        for _ in 0..20 {
            let response = check(
                State(state.clone()),
                Json(CheckRequest {
                    endpoint: "posts/create".to_string(),
                    identifier: "user-1".to_string(),
                }),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_banned_identifier_refused_on_gated_endpoint() {
        let state = test_state(POLICIES, true);

        for _ in 0..5 {
            state.abuse.record_violation("user-1").await;
        }

        let response = check(
            State(state.clone()),
            Json(CheckRequest {
                endpoint: "moderation/report".to_string(),
                identifier: "user-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));

        // The same ban does not gate endpoints that opted out.
        let response = check(
            State(state),
            Json(CheckRequest {
                endpoint: "posts/create".to_string(),
                identifier: "user-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_violation_endpoint_reports_escalation() {
        let state = test_state(POLICIES, true);

        let response = record_violation(
            State(state.clone()),
            Json(ViolationRequest {
                identifier: "user-1".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["violations"], 1);
        assert_eq!(body["warning"], true);
        assert_eq!(body["banned"], false);

        for _ in 0..3 {
            record_violation(
                State(state.clone()),
                Json(ViolationRequest {
                    identifier: "user-1".to_string(),
                }),
            )
            .await;
        }

        let response = record_violation(
            State(state),
            Json(ViolationRequest {
                identifier: "user-1".to_string(),
            }),
        )
        .await;
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["violations"], 5);
        assert_eq!(body["banned"], true);
    }

    #[tokio::test]
    async fn test_abuse_state_round_trip() {
        let state = test_state(POLICIES, true);
        state.abuse.record_violation("user-1").await;

        let response = get_abuse(State(state.clone()), Path("user-1".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["violations"], 1);
        assert_eq!(body["banned"], false);

        let response = clear_abuse(State(state.clone()), Path("user-1".to_string())).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = get_abuse(State(state), Path("user-1".to_string())).await;
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["violations"], 0);
    }
}

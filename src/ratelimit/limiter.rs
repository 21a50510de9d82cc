//! Core admission check against the backing store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{GatewardError, Result};
use crate::store::Store;

use super::counter::{window_start, CounterRecord};
use super::key::LimitKey;
use super::unix_now;

/// Policy for what to return when the backing store is unreachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Admit the request so a storage outage never blocks legitimate traffic
    #[default]
    Open,
    /// Deny the request; for endpoints where over-admission is unsafe
    Closed,
}

/// Per-call configuration for an admission check.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// The rate-limit bucket identity, commonly `"{endpoint}:{identifier}"`
    pub key: String,
    /// Maximum admitted count per window
    pub limit: u64,
    /// Fixed window length in seconds
    pub window_seconds: u64,
    /// Key prefix for isolation between unrelated subsystems
    pub namespace: Option<String>,
    /// Store-failure policy
    pub fail_mode: FailMode,
}

impl CheckOptions {
    /// Create options for `key` with the default namespace and fail-open.
    pub fn new(key: impl Into<String>, limit: u64, window_seconds: u64) -> Self {
        Self {
            key: key.into(),
            limit,
            window_seconds,
            namespace: None,
            fail_mode: FailMode::Open,
        }
    }
}

/// Outcome of an admission check. Computed, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Quota left in the current window
    pub remaining: u64,
    /// When the current window ends, epoch seconds
    pub reset_at: u64,
    /// Seconds until retry is worthwhile; present only when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// The store-backed fixed-window rate limiter.
///
/// Each check is one `get` and one `put` against the store. Two concurrent
/// checks for the same key may both read the same count and both write the
/// increment, under-enforcing the limit by one unit; the contract here is
/// soft admission control, not a hard quota.
pub struct RateLimiter {
    store: Arc<dyn Store>,
}

impl RateLimiter {
    /// Create a rate limiter over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Check and consume one unit of quota for the bucket in `opts`.
    ///
    /// Never returns an error: store failures resolve through
    /// [`FailMode`], and malformed persisted state reads as a fresh window.
    pub async fn check(&self, opts: &CheckOptions) -> RateLimitResult {
        self.check_at(opts, unix_now()).await
    }

    /// [`check`](Self::check) with an explicit clock, for tests.
    pub(crate) async fn check_at(&self, opts: &CheckOptions, now: u64) -> RateLimitResult {
        match self.try_check(opts, now).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    key = %opts.key,
                    fail_mode = ?opts.fail_mode,
                    error = %e,
                    "Store failure during admission check"
                );
                match opts.fail_mode {
                    FailMode::Open => RateLimitResult {
                        allowed: true,
                        remaining: opts.limit,
                        reset_at: now + opts.window_seconds,
                        retry_after: None,
                    },
                    FailMode::Closed => RateLimitResult {
                        allowed: false,
                        remaining: 0,
                        reset_at: now + opts.window_seconds,
                        retry_after: Some(opts.window_seconds),
                    },
                }
            }
        }
    }

    /// The fallible read-evaluate-write cycle behind `check`.
    async fn try_check(&self, opts: &CheckOptions, now: u64) -> Result<RateLimitResult> {
        let key = LimitKey::new(opts.namespace.as_deref(), &opts.key);
        let storage_key = key.storage_key();
        let window = window_start(now, opts.window_seconds);

        trace!(key = %key, window = window, "Checking rate limit");

        let previous = self
            .store
            .get(&storage_key)
            .await?
            .and_then(|raw| CounterRecord::from_json(&raw));

        let record = CounterRecord::observe(previous, window);

        let payload = serde_json::to_string(&record)
            .map_err(|e| GatewardError::Store(format!("encode counter record: {e}")))?;
        self.store
            .put(&storage_key, &payload, opts.window_seconds)
            .await?;

        let allowed = record.count <= opts.limit;
        let reset_at = record.window_start + opts.window_seconds;

        if !allowed {
            debug!(
                key = %key,
                count = record.count,
                limit = opts.limit,
                "Rate limit exceeded"
            );
        }

        Ok(RateLimitResult {
            allowed,
            remaining: opts.limit.saturating_sub(record.count),
            reset_at,
            retry_after: if allowed {
                None
            } else {
                Some(reset_at.saturating_sub(now))
            },
        })
    }
}

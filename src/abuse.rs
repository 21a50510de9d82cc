//! Abuse escalation tracking.
//!
//! A stateful escalation model layered on the same store as the rate
//! limiter: violations accumulate per identifier, decay after a day of
//! inactivity, and escalate repeat offenders into a timed ban. Transitions
//! are monotonic except for decay-on-read and the explicit manual clear;
//! nothing un-bans an identifier before `banned_until` elapses.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GatewardError, Result};
use crate::ratelimit::unix_now;
use crate::store::Store;

/// Inactivity period after which a violation count reads as zero.
pub const DECAY_WINDOW_SECS: u64 = 86_400;
/// Violation count at which an identifier is banned.
pub const BAN_THRESHOLD: u64 = 5;
/// How long a ban lasts.
pub const BAN_DURATION_SECS: u64 = 86_400;

/// Per-identifier abuse state persisted at `abuse:{identifier}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseState {
    /// Violations on record, before decay is applied
    pub violations: u64,
    /// When the last violation was recorded, epoch seconds
    pub last_violation: u64,
    /// End of the active ban, if one was ever applied
    pub banned_until: Option<u64>,
}

impl AbuseState {
    /// The state of an identifier with no history.
    pub fn fresh() -> Self {
        Self {
            violations: 0,
            last_violation: 0,
            banned_until: None,
        }
    }

    /// Whether the identifier is banned as of `now`.
    pub fn is_banned_at(&self, now: u64) -> bool {
        self.banned_until.is_some_and(|until| until > now)
    }

    /// Whether the identifier is currently banned.
    pub fn is_banned(&self) -> bool {
        self.is_banned_at(unix_now())
    }

    /// Seconds of ban left as of `now`; zero when not banned.
    pub fn ban_remaining_at(&self, now: u64) -> u64 {
        match self.banned_until {
            Some(until) if until > now => until - now,
            _ => 0,
        }
    }

    /// Seconds of ban currently left; zero when not banned.
    pub fn ban_remaining(&self) -> u64 {
        self.ban_remaining_at(unix_now())
    }

    /// Apply inactivity decay: a stale violation count reads as zero.
    ///
    /// The ban field is never touched here; only expiry or an explicit
    /// clear ends a ban.
    fn decayed(mut self, now: u64) -> Self {
        if now.saturating_sub(self.last_violation) > DECAY_WINDOW_SECS {
            self.violations = 0;
        }
        self
    }

    /// Parse persisted state, treating malformed payloads as absent.
    fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// What one `record_violation` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationOutcome {
    /// Violation count after this call, decay applied
    pub violations: u64,
    /// First offense: the caller should surface a notice
    pub warning: bool,
    /// This call escalated the identifier into a ban
    pub banned: bool,
    /// End of the active ban, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned_until: Option<u64>,
}

impl ViolationOutcome {
    /// Outcome reported when the store is unreachable: no state was
    /// recorded, so no notice and no ban are signalled.
    fn fail_open() -> Self {
        Self {
            violations: 0,
            warning: false,
            banned: false,
            banned_until: None,
        }
    }
}

/// The storage key for an identifier's abuse state.
fn abuse_key(identifier: &str) -> String {
    format!("abuse:{}", identifier)
}

/// Store-backed violation counter with escalation to timed bans.
pub struct AbuseTracker {
    store: Arc<dyn Store>,
}

impl AbuseTracker {
    /// Create an abuse tracker over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Read the identifier's state with decay applied.
    ///
    /// Fails open: a store error or malformed record reads as fresh state.
    pub async fn get_state(&self, identifier: &str) -> AbuseState {
        self.get_state_at(identifier, unix_now()).await
    }

    /// [`get_state`](Self::get_state) with an explicit clock, for tests.
    pub(crate) async fn get_state_at(&self, identifier: &str, now: u64) -> AbuseState {
        match self.load(identifier).await {
            Ok(state) => state.decayed(now),
            Err(e) => {
                warn!(identifier, error = %e, "Store failure reading abuse state");
                AbuseState::fresh()
            }
        }
    }

    /// Count one violation against the identifier.
    ///
    /// The first violation signals a warning; the fifth (without decay in
    /// between) escalates to a [`BAN_DURATION_SECS`] ban. Violations in
    /// between accumulate silently. Never returns an error: a store failure
    /// records nothing and signals nothing.
    pub async fn record_violation(&self, identifier: &str) -> ViolationOutcome {
        self.record_violation_at(identifier, unix_now()).await
    }

    /// [`record_violation`](Self::record_violation) with an explicit clock.
    pub(crate) async fn record_violation_at(&self, identifier: &str, now: u64) -> ViolationOutcome {
        match self.try_record(identifier, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(identifier, error = %e, "Store failure recording violation");
                ViolationOutcome::fail_open()
            }
        }
    }

    /// Remove the identifier's abuse state entirely (manual unban).
    pub async fn clear(&self, identifier: &str) -> Result<()> {
        info!(identifier, "Clearing abuse state");
        self.store.delete(&abuse_key(identifier)).await
    }

    async fn load(&self, identifier: &str) -> Result<AbuseState> {
        let state = self
            .store
            .get(&abuse_key(identifier))
            .await?
            .and_then(|raw| AbuseState::from_json(&raw))
            .unwrap_or_else(AbuseState::fresh);
        Ok(state)
    }

    async fn try_record(&self, identifier: &str, now: u64) -> Result<ViolationOutcome> {
        let state = self.load(identifier).await?.decayed(now);

        let violations = state.violations + 1;
        let mut banned_until = state.banned_until;
        let mut banned = false;

        if violations >= BAN_THRESHOLD && !state.is_banned_at(now) {
            let until = now + BAN_DURATION_SECS;
            banned_until = Some(until);
            banned = true;
            warn!(
                identifier,
                violations,
                banned_until = until,
                "Identifier banned after repeated violations"
            );
        }

        let next = AbuseState {
            violations,
            last_violation: now,
            banned_until,
        };

        // The record must outlive any active ban, not just the decay window.
        let ttl = match banned_until {
            Some(until) if until > now => DECAY_WINDOW_SECS.max(until - now),
            _ => DECAY_WINDOW_SECS,
        };

        let payload = serde_json::to_string(&next)
            .map_err(|e| GatewardError::Store(format!("encode abuse state: {e}")))?;
        self.store
            .put(&abuse_key(identifier), &payload, ttl)
            .await?;

        Ok(ViolationOutcome {
            violations,
            warning: violations == 1,
            banned,
            banned_until,
        })
    }
}

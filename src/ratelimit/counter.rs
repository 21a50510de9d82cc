//! Persisted window counter record.

use serde::{Deserialize, Serialize};

/// Compute the start of the fixed window containing `now`.
pub fn window_start(now: u64, window_seconds: u64) -> u64 {
    // A zero-length window would divide by zero; treat it as one second.
    let window = window_seconds.max(1);
    (now / window) * window
}

/// A per-key counter persisted in the store for the lifetime of one window.
///
/// The record self-expires via store TTL equal to the window length, so the
/// `window_start` field is a correctness check rather than the only expiry
/// mechanism: a record surviving past its window (the store is only
/// eventually consistent about TTLs) is still detected and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Requests observed in this window so far
    pub count: u64,
    /// Start of the fixed window, epoch seconds
    pub window_start: u64,
}

impl CounterRecord {
    /// Fold one more observation into the record for `window_start`.
    ///
    /// A previous record from a different window (or none at all) starts a
    /// fresh window at count 1.
    pub fn observe(previous: Option<CounterRecord>, window_start: u64) -> Self {
        match previous {
            Some(prev) if prev.window_start == window_start => Self {
                count: prev.count + 1,
                window_start,
            },
            _ => Self {
                count: 1,
                window_start,
            },
        }
    }

    /// Parse a persisted record, treating malformed payloads as absent.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

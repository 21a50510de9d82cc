//! Rate limiting logic and state management.

mod counter;
mod key;
mod limiter;
mod policy;

pub use counter::CounterRecord;
pub use key::LimitKey;
pub use limiter::{CheckOptions, FailMode, RateLimitResult, RateLimiter};
pub use policy::{EndpointPolicy, PolicySet};

/// Current time as whole seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

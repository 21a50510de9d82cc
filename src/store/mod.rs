//! Pluggable key-value store contract.

use async_trait::async_trait;

use crate::error::Result;

mod memory;

pub use memory::MemoryStore;

/// Trait for key-value store backends.
///
/// This trait abstracts over whatever holds admission state: an
/// edge-distributed KV namespace in production, an in-process map in tests.
/// No atomic increment or compare-and-swap is assumed: the engine is written
/// against plain read-then-write semantics and tolerates the resulting
/// races. Implementations own nothing beyond the keys they are handed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the value at `key`, or `None` if absent or expired.
    ///
    /// Fails with [`GatewardError::Store`](crate::error::GatewardError::Store)
    /// on transport or backend errors.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` at `key`, expiring after `ttl_seconds`.
    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    /// Remove the value at `key`, if any.
    async fn delete(&self, key: &str) -> Result<()>;
}

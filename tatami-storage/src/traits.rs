//! Shared key-value store trait.
//!
//! This trait abstracts over the store every coordinator instance talks to
//! (Redis in production, an in-memory map in tests). It must be visible to
//! all processes: that visibility is what makes the cache and the lock
//! distributed rather than per-process.
//!
//! # Consistency
//!
//! Each key is read and written independently. There is no multi-key
//! transaction; callers tolerate seeing one key updated before another.
//!
//! # Errors
//!
//! Network or store failures surface as [`tatami_core::StoreError`]. Implementations must
//! never report a failure as a missing key.

use async_trait::async_trait;
use std::time::Duration;
use tatami_core::StoreResult;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key. `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a key unconditionally, without expiry.
    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Write a key only if it does not exist, expiring it after `ttl`.
    ///
    /// Returns `true` if this call created the key. This is the single
    /// conditional write the distributed lock relies on.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool>;

    /// Delete a key only if it currently holds `expected`.
    ///
    /// Returns `true` if the key was deleted.
    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool>;

    /// Round-trip to the store, returning the observed latency.
    async fn ping(&self) -> StoreResult<Duration>;
}

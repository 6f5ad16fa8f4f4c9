//! Test doubles for the store, the lock and producers.
//!
//! Public so downstream crates can drive the coordinator in their own tests
//! without a Redis instance.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tatami_core::{Clock, ProducerError, StoreError, StoreResult, Timestamp};

use crate::cache::Producer;
use crate::memory::InMemoryStore;
use crate::traits::KeyValueStore;

// ============================================================================
// PRODUCERS
// ============================================================================

/// Returns a fixed value after an optional delay and counts its calls.
///
/// Clones share the counter.
#[derive(Debug, Clone)]
pub struct CountingProducer<T> {
    value: T,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl<T> CountingProducer<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep on tokio's clock before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T> Producer<T> for CountingProducer<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn produce(&self) -> Result<T, ProducerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.value.clone())
    }
}

/// Always fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingProducer {
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingProducer {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> Producer<T> for FailingProducer {
    async fn produce(&self) -> Result<T, ProducerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProducerError::new(self.message.clone()))
    }
}

/// Panics when called.
#[derive(Debug, Clone)]
pub struct PanickingProducer {
    message: String,
}

impl PanickingProducer {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Producer<T> for PanickingProducer {
    async fn produce(&self) -> Result<T, ProducerError> {
        panic!("{}", self.message)
    }
}

// ============================================================================
// STORES
// ============================================================================

/// A store that is never reachable.
#[derive(Debug, Clone, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    pub fn new() -> Self {
        Self
    }

    fn down() -> StoreError {
        StoreError::unavailable("connection refused")
    }
}

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Err(Self::down())
    }

    async fn set(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        Err(Self::down())
    }

    async fn set_if_absent(&self, _key: &str, _value: &[u8], _ttl: Duration) -> StoreResult<bool> {
        Err(Self::down())
    }

    async fn delete_if_equals(&self, _key: &str, _expected: &[u8]) -> StoreResult<bool> {
        Err(Self::down())
    }

    async fn ping(&self) -> StoreResult<Duration> {
        Err(Self::down())
    }
}

/// An in-memory store whose conditional writes always fail.
///
/// Plain reads and writes work, so cached values are served while every
/// lock acquisition errors out.
#[derive(Debug, Clone, Default)]
pub struct FlakyLockStore {
    inner: InMemoryStore,
}

impl FlakyLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for FlakyLockStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.set(key, value).await
    }

    async fn set_if_absent(&self, _key: &str, _value: &[u8], _ttl: Duration) -> StoreResult<bool> {
        Err(StoreError::timeout("SET NX", Duration::from_secs(3)))
    }

    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        self.inner.delete_if_equals(key, expected).await
    }

    async fn ping(&self) -> StoreResult<Duration> {
        self.inner.ping().await
    }
}

/// An in-memory store that refuses plain writes.
///
/// Reads and the lock primitives work, so a refresh takes the lock, runs its
/// producer and then fails to write, like a Redis replica in read-only mode.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyStore {
    inner: InMemoryStore,
}

impl ReadOnlyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        Err(StoreError::unavailable(
            "READONLY You can't write against a read only replica",
        ))
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        self.inner.delete_if_equals(key, expected).await
    }

    async fn ping(&self) -> StoreResult<Duration> {
        self.inner.ping().await
    }
}

// ============================================================================
// CLOCKS
// ============================================================================

/// Wall clock driven by tokio's clock.
///
/// Under `start_paused` tests, sleeping or advancing tokio time moves this
/// clock by the same amount, so written timestamps follow simulated time.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Timestamp,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(origin: Timestamp) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin
            .checked_add_signed(elapsed)
            .unwrap_or(self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_counting_producer_counts_across_clones() {
        let producer = CountingProducer::new("v");
        let clone = producer.clone();
        producer.produce().await.expect("ok");
        clone.produce().await.expect("ok");
        assert_eq!(producer.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_producer() {
        let producer = FailingProducer::new("nope");
        let result: Result<u8, _> = producer.produce().await;
        assert_eq!(result, Err(ProducerError::new("nope")));
        assert_eq!(producer.calls(), 1);
    }

    #[tokio::test]
    async fn test_flaky_lock_store_only_fails_conditional_writes() {
        let store = FlakyLockStore::new();
        store.set("k", b"v").await.expect("set");
        assert_eq!(store.get("k").await.expect("get"), Some(b"v".to_vec()));
        assert!(store
            .set_if_absent("k:lock", b"x", Duration::from_secs(1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_read_only_store_refuses_plain_writes() {
        let store = ReadOnlyStore::new();
        assert!(store.set("k", b"v").await.is_err());
        assert!(store
            .set_if_absent("k:lock", b"x", Duration::from_secs(1))
            .await
            .expect("nx"));
        assert!(store.delete_if_equals("k:lock", b"x").await.expect("del"));
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let origin = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid");
        let clock = TokioClock::new(origin);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(clock.now(), origin + chrono::Duration::milliseconds(1500));
    }
}

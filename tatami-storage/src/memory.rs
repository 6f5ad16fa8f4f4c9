//! In-memory key-value store.
//!
//! Clones share one map, so several coordinators built from clones of the
//! same store behave like several processes pointed at one Redis. Expiry is
//! measured on tokio's clock, which lets paused-time tests expire locks
//! without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tatami_core::{StoreError, StoreResult};
use tokio::time::Instant;

use crate::traits::KeyValueStore;

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local store for tests and single-instance deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys. Counts through a poisoned lock rather than
    /// reporting an empty store.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|v| v.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.bytes.clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        if entries.get(key).is_some_and(|v| v.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let matches = entries
            .get(key)
            .is_some_and(|v| v.is_live(now) && v.bytes == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        let _entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(start.elapsed())
    }
}

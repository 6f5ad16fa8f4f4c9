//! Refresh coordinator: stale-while-revalidate over the shared store.
//!
//! One `fetch` call:
//!
//! 1. reads `<key>` and `<key>:timestamp`
//! 2. returns a fresh entry as-is
//! 3. otherwise tries the refresh lock once; the winner spawns the producer
//!    as a detached task that writes value then timestamp, then releases
//! 4. returns the stale value immediately if there is one, waits on its own
//!    refresh for a cold key, or reports `Pending` when a cold key's lock
//!    went elsewhere
//!
//! The read-then-decide step is not serialized across processes. Two callers
//! may both see "stale"; only one wins the lock and the other defers.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::SubsecRound;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tatami_core::{
    decode_timestamp, encode_timestamp, CacheEntry, CacheKey, Clock, RefreshConfig, RefreshError,
    StoreResult, SystemClock, TatamiResult, Timestamp,
};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::freshness::{CacheRead, ReadSource};
use super::producer::Producer;
use crate::lock::{DistributedLock, LockGuard, StoreLock};
use crate::traits::KeyValueStore;

/// Value written by a successful refresh, with the time it was stored.
pub type Refreshed<T> = CacheEntry<T>;

/// Outcome of [`RefreshCoordinator::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// A value is available.
    Ready(CacheRead<T>),
    /// The key was cold and the refresh this call waited on failed.
    Failed {
        error: RefreshError,
        completed_at: Timestamp,
    },
    /// The key was cold and another process holds the refresh lock.
    /// Not a failure: the value should appear shortly.
    Pending,
}

impl<T> Fetched<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Fetched::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Fetched::Pending)
    }

    pub fn into_ready(self) -> Option<CacheRead<T>> {
        match self {
            Fetched::Ready(read) => Some(read),
            _ => None,
        }
    }
}

/// Handle to a spawned refresh task.
///
/// Dropping the handle detaches the task; it still runs to completion and
/// its write still lands.
pub struct RefreshHandle<T> {
    key: CacheKey,
    task: JoinHandle<Result<Refreshed<T>, RefreshError>>,
}

impl<T> fmt::Debug for RefreshHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("key", &self.key)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl<T> RefreshHandle<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the refresh to finish.
    pub async fn join(self) -> Result<Refreshed<T>, RefreshError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(RefreshError::Aborted {
                reason: e.to_string(),
            }),
        }
    }
}

/// Coordinates readers and refreshers of cached values across processes.
///
/// Construct once at startup and share it; it holds no per-key state, all
/// coordination goes through the store and the lock.
pub struct RefreshCoordinator<S: KeyValueStore + ?Sized, L: DistributedLock + ?Sized> {
    store: Arc<S>,
    lock: Arc<L>,
    config: RefreshConfig,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore + ?Sized, L: DistributedLock + ?Sized> Clone for RefreshCoordinator<S, L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lock: Arc::clone(&self.lock),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: KeyValueStore + ?Sized, L: DistributedLock + ?Sized> fmt::Debug
    for RefreshCoordinator<S, L>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<S> RefreshCoordinator<S, StoreLock<S>>
where
    S: KeyValueStore + ?Sized + 'static,
{
    /// Coordinator whose lock lives in the same store as the values.
    pub fn with_store_lock(store: Arc<S>, config: RefreshConfig) -> Self {
        let lock = Arc::new(StoreLock::new(Arc::clone(&store)));
        Self::new(store, lock, config)
    }
}

impl<S, L> RefreshCoordinator<S, L>
where
    S: KeyValueStore + ?Sized + 'static,
    L: DistributedLock + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, lock: Arc<L>, config: RefreshConfig) -> Self {
        Self {
            store,
            lock,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for staleness checks and written timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Return the cached value for `key`, refreshing it with `producer` when
    /// stale or missing.
    ///
    /// # Errors
    ///
    /// Only store failures while reading the cached entry. Lock contention,
    /// lock errors and producer failures are outcomes, not errors.
    pub async fn fetch<T, P>(&self, key: &CacheKey, producer: P) -> TatamiResult<Fetched<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        P: Producer<T> + 'static,
    {
        let now = self.clock.now();
        let cached = match self.read_cached::<T>(key).await? {
            Some((value, stored_at)) if !self.config.staleness.is_stale(stored_at, now) => {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(Fetched::Ready(CacheRead::new(
                    value,
                    stored_at,
                    ReadSource::Fresh,
                )));
            }
            other => other,
        };

        let refresh = self.spawn_refresh(key, producer).await;

        match (cached, refresh) {
            (Some((value, stored_at)), refresh) => {
                tracing::debug!(
                    key = %key,
                    refresh_scheduled = refresh.is_some(),
                    "Serving stale value"
                );
                Ok(Fetched::Ready(CacheRead::new(
                    value,
                    stored_at,
                    ReadSource::Stale,
                )))
            }
            (None, Some(refresh)) => {
                tracing::debug!(key = %key, "Cold miss, waiting for refresh");
                match refresh.join().await {
                    Ok(entry) => Ok(Fetched::Ready(CacheRead::new(
                        entry.value,
                        Some(entry.stored_at),
                        ReadSource::Refreshed,
                    ))),
                    Err(error) => Ok(Fetched::Failed {
                        error,
                        completed_at: self.clock.now(),
                    }),
                }
            }
            (None, None) => {
                tracing::debug!(key = %key, "Cold miss, refresh running elsewhere");
                Ok(Fetched::Pending)
            }
        }
    }

    /// Try to take the refresh lock for `key` and, on success, run
    /// `producer` in a detached task.
    ///
    /// Returns `None` when the lock is held elsewhere or could not be
    /// reached; both mean "someone else will refresh".
    pub async fn spawn_refresh<T, P>(&self, key: &CacheKey, producer: P) -> Option<RefreshHandle<T>>
    where
        T: Serialize + Send + 'static,
        P: Producer<T> + 'static,
    {
        let lock_key = key.lock_key();
        let guard =
            match LockGuard::acquire(Arc::clone(&self.lock), &lock_key, self.config.lock_ttl).await {
                Ok(Some(guard)) => guard,
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Refresh lock unavailable, deferring");
                    return None;
                }
            };

        let task = RefreshTask {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            key: key.clone(),
        };
        let span = tracing::info_span!("refresh", key = %key);
        let handle = tokio::spawn(task.run(producer, guard).instrument(span));

        Some(RefreshHandle {
            key: key.clone(),
            task: handle,
        })
    }

    /// Read the value and timestamp halves of an entry.
    ///
    /// A payload that does not deserialize is treated as absent so the next
    /// refresh overwrites it.
    async fn read_cached<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> StoreResult<Option<(T, Option<Timestamp>)>> {
        let Some(raw) = self.store.get(&key.value_key()).await? else {
            return Ok(None);
        };

        let value = match serde_json::from_slice::<T>(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cached payload unreadable, treating as miss");
                return Ok(None);
            }
        };

        let stored_at = self
            .store
            .get(&key.timestamp_key())
            .await?
            .as_deref()
            .and_then(decode_timestamp);

        if stored_at.is_none() {
            tracing::debug!(key = %key, "Cached value has no readable timestamp");
        }

        Ok(Some((value, stored_at)))
    }
}

/// State moved into a spawned refresh.
struct RefreshTask<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    key: CacheKey,
}

impl<S: KeyValueStore + ?Sized> RefreshTask<S> {
    async fn run<T, P, L>(self, producer: P, guard: LockGuard<L>) -> Result<Refreshed<T>, RefreshError>
    where
        T: Serialize + Send + 'static,
        P: Producer<T>,
        L: DistributedLock + ?Sized + 'static,
    {
        let outcome = match AssertUnwindSafe(producer.produce()).catch_unwind().await {
            Ok(Ok(value)) => self.write(value).await,
            Ok(Err(e)) => Err(RefreshError::Producer(e)),
            Err(panic) => Err(RefreshError::Panicked {
                message: panic_message(&*panic),
            }),
        };

        guard.release().await;

        match &outcome {
            Ok(entry) => {
                tracing::info!(stored_at = %encode_timestamp(entry.stored_at), "Refresh completed");
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "Refresh failed");
            }
        }
        outcome
    }

    /// Value first, then timestamp. A reader between the two writes sees the
    /// new value with the old timestamp, which only makes it look older.
    async fn write<T: Serialize>(&self, value: T) -> Result<Refreshed<T>, RefreshError> {
        let payload = serde_json::to_vec(&value).map_err(|e| RefreshError::Codec {
            reason: e.to_string(),
        })?;
        self.store.set(&self.key.value_key(), &payload).await?;

        // Persisted with millisecond precision; report what readers will see.
        let stored_at = self.clock.now().trunc_subsecs(3);
        self.store
            .set(&self.key.timestamp_key(), encode_timestamp(stored_at).as_bytes())
            .await?;

        Ok(CacheEntry::merge(None, CacheEntry::new(value, stored_at)))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

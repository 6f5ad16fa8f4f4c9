//! Best-effort distributed lock over the shared store.
//!
//! `acquire` performs exactly one conditional write and never waits or
//! retries: losing the race means another process is already refreshing, and
//! the caller should fall back to whatever is cached. The TTL is the only
//! recovery from a holder that crashes before releasing. There is no
//! heartbeat.
//!
//! ```text
//! (free) ── acquire() ──→ held ── release() ──→ (free)
//!                           │
//!                       ttl elapses ──→ (free)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tatami_core::{Clock, LockToken, StoreResult, SystemClock};

use crate::traits::KeyValueStore;

/// Non-blocking, TTL-bounded mutual exclusion keyed by lock name.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try once to take `lock_key` for `ttl`.
    ///
    /// `Ok(None)` means the key is already held. Store failures are returned
    /// so the caller can log them; they never mean "acquired".
    async fn acquire(&self, lock_key: &str, ttl: Duration) -> StoreResult<Option<LockToken>>;

    /// Give the lock back. Idempotent and best-effort: safe on an expired
    /// token, on a token released before, and when the store is down.
    async fn release(&self, token: &LockToken);
}

/// [`DistributedLock`] built on a [`KeyValueStore`]'s conditional writes.
pub struct StoreLock<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore + ?Sized> StoreLock<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl<S: KeyValueStore + ?Sized> Clone for StoreLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> DistributedLock for StoreLock<S> {
    async fn acquire(&self, lock_key: &str, ttl: Duration) -> StoreResult<Option<LockToken>> {
        let token = LockToken::new(lock_key, ttl, self.clock.now());
        let acquired = self
            .store
            .set_if_absent(lock_key, &token.sentinel(), ttl)
            .await?;

        if acquired {
            tracing::debug!(lock_key, owner = %token.owner, ttl_ms = ttl.as_millis() as u64, "Lock acquired");
            Ok(Some(token))
        } else {
            tracing::debug!(lock_key, "Lock held elsewhere");
            Ok(None)
        }
    }

    async fn release(&self, token: &LockToken) {
        match self
            .store
            .delete_if_equals(&token.lock_key, &token.sentinel())
            .await
        {
            Ok(true) => {
                tracing::debug!(lock_key = %token.lock_key, owner = %token.owner, "Lock released");
            }
            Ok(false) => {
                tracing::debug!(
                    lock_key = %token.lock_key,
                    owner = %token.owner,
                    "Lock already gone or owned by another holder"
                );
            }
            Err(e) => {
                tracing::warn!(
                    lock_key = %token.lock_key,
                    error = %e,
                    "Lock release failed, key will expire by TTL"
                );
            }
        }
    }
}

/// Scoped ownership of an acquired lock.
///
/// Call [`LockGuard::release`] on every normal exit. If the guard is dropped
/// while still holding the token (a panic unwinding through the protected
/// section, or the task being cancelled), the release is scheduled on the
/// current tokio runtime instead.
pub struct LockGuard<L: DistributedLock + ?Sized + 'static> {
    lock: Arc<L>,
    token: Option<LockToken>,
}

impl<L: DistributedLock + ?Sized + 'static> LockGuard<L> {
    pub fn new(lock: Arc<L>, token: LockToken) -> Self {
        Self {
            lock,
            token: Some(token),
        }
    }

    /// Acquire `lock_key` and wrap the token in a guard.
    pub async fn acquire(lock: Arc<L>, lock_key: &str, ttl: Duration) -> StoreResult<Option<Self>> {
        let token = lock.acquire(lock_key, ttl).await?;
        Ok(token.map(|token| Self::new(lock, token)))
    }

    pub fn token(&self) -> Option<&LockToken> {
        self.token.as_ref()
    }

    pub async fn release(mut self) {
        if let Some(token) = self.token.take() {
            self.lock.release(&token).await;
        }
    }
}

impl<L: DistributedLock + ?Sized + 'static> Drop for LockGuard<L> {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let lock = Arc::clone(&self.lock);
                handle.spawn(async move {
                    lock.release(&token).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    lock_key = %token.lock_key,
                    "Lock guard dropped outside a runtime, key will expire by TTL"
                );
            }
        }
    }
}

//! Lock tokens for the refresh lock.
//!
//! A token is proof that one conditional write on a lock key succeeded. It
//! stops being valid when it is released or when the store expires the key,
//! whichever comes first. There is no renewal.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Proof of ownership of a lock key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    pub lock_key: String,
    /// Random owner id written as the lock sentinel. Release only deletes
    /// the key while it still holds this value.
    pub owner: Uuid,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl LockToken {
    /// Create a token with a fresh owner id, expiring `ttl` after `now`.
    pub fn new(lock_key: impl Into<String>, ttl: Duration, now: Timestamp) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            lock_key: lock_key.into(),
            owner: Uuid::now_v7(),
            acquired_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(now),
        }
    }

    /// Sentinel bytes stored under the lock key.
    pub fn sentinel(&self) -> Vec<u8> {
        self.owner.to_string().into_bytes()
    }

    /// Check if the lock has expired based on current time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Calculate remaining duration until expiry.
    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        if now >= self.expires_at {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }
}

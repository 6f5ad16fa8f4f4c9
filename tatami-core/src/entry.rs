//! Cache entries and the staleness rule.
//!
//! An entry is stale when it is older than the configured window, or when its
//! timestamp is missing. The value and timestamp halves are written as two
//! independent store operations, so a reader may see one without the other.
//! A missing or unreadable timestamp is therefore "infinitely stale", never
//! an error.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Timestamp;

/// Default staleness window.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(60);

/// Staleness window `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessPolicy {
    pub max_age: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_STALENESS,
        }
    }
}

impl StalenessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// `now - stored_at > max_age`, or no timestamp at all.
    ///
    /// An entry exactly `max_age` old is still fresh. Timestamps ahead of
    /// `now` (clock skew between writers) count as fresh.
    pub fn is_stale(&self, stored_at: Option<Timestamp>, now: Timestamp) -> bool {
        let Some(stored_at) = stored_at else {
            return true;
        };
        match (now - stored_at).to_std() {
            Ok(age) => age > self.max_age,
            Err(_) => false,
        }
    }
}

/// A cached payload paired with the time it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Timestamp,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, stored_at: Timestamp) -> Self {
        Self { value, stored_at }
    }

    /// Last write wins: the fresh entry always replaces the existing one.
    pub fn merge(existing: Option<CacheEntry<V>>, fresh: CacheEntry<V>) -> CacheEntry<V> {
        drop(existing);
        fresh
    }

    pub fn is_stale(&self, policy: &StalenessPolicy, now: Timestamp) -> bool {
        policy.is_stale(Some(self.stored_at), now)
    }

    /// Age of the entry, zero if its timestamp lies in the future.
    pub fn age(&self, now: Timestamp) -> Duration {
        (now - self.stored_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Encode a timestamp the way it is persisted under `<key>:timestamp`.
pub fn encode_timestamp(timestamp: Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a persisted timestamp. Any RFC 3339 offset is accepted.
///
/// Returns `None` for bytes that are not a valid timestamp.
pub fn decode_timestamp(raw: &[u8]) -> Option<Timestamp> {
    let text = std::str::from_utf8(raw).ok()?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Clock, ManualClock};
    use chrono::TimeZone;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_missing_timestamp_is_stale() {
        let policy = StalenessPolicy::default();
        assert!(policy.is_stale(None, at(0)));
    }

    #[test]
    fn test_within_window_is_fresh() {
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        assert!(!policy.is_stale(Some(at(0)), at(10)));
    }

    #[test]
    fn test_boundary_is_fresh_and_just_past_is_stale() {
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        assert!(!policy.is_stale(Some(at(0)), at(60)));

        let just_past = at(60) + chrono::Duration::milliseconds(1);
        assert!(policy.is_stale(Some(at(0)), just_past));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        assert!(!policy.is_stale(Some(at(120)), at(0)));
    }

    #[test]
    fn test_merge_fresh_wins() {
        let old = CacheEntry::new("v1", at(0));
        let fresh = CacheEntry::new("v2", at(70));
        let merged = CacheEntry::merge(Some(old), fresh.clone());
        assert_eq!(merged, fresh);

        let merged = CacheEntry::merge(None, fresh.clone());
        assert_eq!(merged, fresh);
    }

    #[test]
    fn test_entry_age_and_staleness() {
        let entry = CacheEntry::new(1u8, at(0));
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        assert_eq!(entry.age(at(30)), Duration::from_secs(30));
        assert_eq!(entry.age(at(-5)), Duration::ZERO);
        assert!(!entry.is_stale(&policy, at(30)));
        assert!(entry.is_stale(&policy, at(130)));
    }

    #[test]
    fn test_entry_goes_stale_as_clock_advances() {
        let clock = ManualClock::new(at(0));
        let policy = StalenessPolicy::new(Duration::from_secs(60));
        let entry = CacheEntry::new("v", clock.now());

        clock.advance(Duration::from_secs(60));
        assert!(!entry.is_stale(&policy, clock.now()));

        clock.advance(Duration::from_millis(1));
        assert!(entry.is_stale(&policy, clock.now()));
    }

    #[test]
    fn test_timestamp_encoding() {
        let t = at(0) + chrono::Duration::milliseconds(500);
        let encoded = encode_timestamp(t);
        assert_eq!(encoded, "2023-11-14T22:13:20.500Z");
        assert_eq!(decode_timestamp(encoded.as_bytes()), Some(t));
    }

    #[test]
    fn test_timestamp_decoding_accepts_offsets() {
        let decoded = decode_timestamp(b"2023-11-14T23:13:20+01:00");
        assert_eq!(decoded, Some(at(0)));
    }

    #[test]
    fn test_timestamp_decoding_garbage_is_none() {
        assert_eq!(decode_timestamp(b"yesterday"), None);
        assert_eq!(decode_timestamp(&[0xff, 0xfe]), None);
    }
}

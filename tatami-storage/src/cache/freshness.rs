//! Freshness metadata for cache reads.
//!
//! Every value handed out by the coordinator says how it was obtained, so
//! callers (and HTTP responses) can tell a fresh hit from a stale one that
//! is being revalidated in the background.

use std::fmt;
use std::time::Duration;

use tatami_core::Timestamp;

/// Where a returned value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadSource {
    /// Cached and within the staleness window.
    Fresh,
    /// Cached but past the window. A refresh was scheduled here or is
    /// already running elsewhere.
    Stale,
    /// Nothing was cached; this caller waited for the refresh it started.
    Refreshed,
}

impl ReadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadSource::Fresh => "fresh",
            ReadSource::Stale => "stale",
            ReadSource::Refreshed => "refreshed",
        }
    }
}

impl fmt::Display for ReadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a cache read, carrying staleness metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    /// `None` when the value was found without its timestamp.
    stored_at: Option<Timestamp>,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub fn new(value: T, stored_at: Option<Timestamp>, source: ReadSource) -> Self {
        Self {
            value,
            stored_at,
            source,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the value was last refreshed, if known.
    pub fn stored_at(&self) -> Option<Timestamp> {
        self.stored_at
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// True when the value was served from the cache without waiting.
    pub fn was_cache_hit(&self) -> bool {
        !matches!(self.source, ReadSource::Refreshed)
    }

    /// Age of the value at `now`.
    ///
    /// `None` if the timestamp is unknown. Zero if it lies in the future.
    pub fn staleness(&self, now: Timestamp) -> Option<Duration> {
        self.stored_at
            .map(|at| (now - at).to_std().unwrap_or(Duration::ZERO))
    }

    /// Check if the data was stored at or after `timestamp`.
    pub fn is_fresh_as_of(&self, timestamp: Timestamp) -> bool {
        self.stored_at.is_some_and(|at| at >= timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid")
    }

    #[test]
    fn test_source_strings() {
        assert_eq!(ReadSource::Fresh.to_string(), "fresh");
        assert_eq!(ReadSource::Stale.to_string(), "stale");
        assert_eq!(ReadSource::Refreshed.to_string(), "refreshed");
    }

    #[test]
    fn test_cache_hit_flags() {
        assert!(CacheRead::new(1, Some(at(0)), ReadSource::Fresh).was_cache_hit());
        assert!(CacheRead::new(1, None, ReadSource::Stale).was_cache_hit());
        assert!(!CacheRead::new(1, Some(at(0)), ReadSource::Refreshed).was_cache_hit());
    }

    #[test]
    fn test_staleness() {
        let read = CacheRead::new("v", Some(at(0)), ReadSource::Fresh);
        assert_eq!(read.staleness(at(30)), Some(Duration::from_secs(30)));
        assert_eq!(read.staleness(at(-5)), Some(Duration::ZERO));

        let untimed = CacheRead::new("v", None, ReadSource::Stale);
        assert_eq!(untimed.staleness(at(30)), None);
        assert!(!untimed.is_fresh_as_of(at(0)));
    }

    #[test]
    fn test_is_fresh_as_of() {
        let read = CacheRead::new("v", Some(at(10)), ReadSource::Fresh);
        assert!(read.is_fresh_as_of(at(10)));
        assert!(read.is_fresh_as_of(at(5)));
        assert!(!read.is_fresh_as_of(at(11)));
    }
}

//! TATAMI Core - Cache Data Types
//!
//! Pure data structures shared by the storage and API crates. This crate
//! performs no I/O: keys, entries, staleness rules, lock tokens, clocks,
//! configuration and the error taxonomy live here.

use chrono::{DateTime, Utc};

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod lock;
pub mod time;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use config::{RefreshConfig, StoreConfig, TatamiConfig};
pub use entry::{decode_timestamp, encode_timestamp, CacheEntry, StalenessPolicy};
pub use error::{
    ConfigError, KeyError, ProducerError, RefreshError, RefreshErrorKind, StoreError, StoreResult,
    TatamiError, TatamiResult,
};
pub use key::CacheKey;
pub use lock::LockToken;
pub use time::{Clock, ManualClock, SystemClock};

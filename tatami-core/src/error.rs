//! Error types for TATAMI operations

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Shared key-value store errors.
///
/// Any of these reaching the caller of a fetch means the store itself could
/// not be consulted. They are never downgraded to "cache empty".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store operation {operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Connection pool error: {reason}")]
    Pool { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Create an Unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a Timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

/// Result type alias for store round-trips.
pub type StoreResult<T> = Result<T, StoreError>;

/// Cache key construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Cache key {part} must not be empty")]
    Empty { part: &'static str },

    #[error("Cache key {part} '{value}' contains reserved character {found:?}")]
    ReservedCharacter {
        part: &'static str,
        value: String,
        found: char,
    },

    #[error("Malformed cache key '{0}', expected <prefix>:<id>")]
    Malformed(String),
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failure reported by a producer.
///
/// Producers are opaque; the only thing the cache keeps from their failure
/// is a message that can be surfaced to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProducerError {
    pub message: String,
}

impl ProducerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ProducerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ProducerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Discriminant of a [`RefreshError`], handy for logging and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshErrorKind {
    Producer,
    Store,
    Codec,
    Panicked,
    Aborted,
}

impl fmt::Display for RefreshErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshErrorKind::Producer => "producer",
            RefreshErrorKind::Store => "store",
            RefreshErrorKind::Codec => "codec",
            RefreshErrorKind::Panicked => "panicked",
            RefreshErrorKind::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of a failed background refresh.
///
/// Carried through the refresh task's completion channel in place of a value.
/// Only a caller waiting on a cold key ever sees one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Producer failed: {0}")]
    Producer(#[from] ProducerError),

    #[error("Writing refreshed value failed: {0}")]
    Store(#[from] StoreError),

    #[error("Payload encoding failed: {reason}")]
    Codec { reason: String },

    #[error("Producer panicked: {message}")]
    Panicked { message: String },

    #[error("Refresh task aborted: {reason}")]
    Aborted { reason: String },
}

impl RefreshError {
    pub fn kind(&self) -> RefreshErrorKind {
        match self {
            RefreshError::Producer(_) => RefreshErrorKind::Producer,
            RefreshError::Store(_) => RefreshErrorKind::Store,
            RefreshError::Codec { .. } => RefreshErrorKind::Codec,
            RefreshError::Panicked { .. } => RefreshErrorKind::Panicked,
            RefreshError::Aborted { .. } => RefreshErrorKind::Aborted,
        }
    }
}

/// Master error type for all TATAMI errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TatamiError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for TATAMI operations.
pub type TatamiResult<T> = Result<T, TatamiError>;

// =============================================================================
// TESTS
// =============================================================================

//! Cache key namespacing.
//!
//! A `CacheKey` names one cached resource as `<prefix>:<id>`. Three store
//! keys are derived from it: the value key, the timestamp key and the lock
//! key. Construction rejects the separator inside either part, so derived
//! keys of two distinct `CacheKey`s can never collide.

use std::fmt;
use std::str::FromStr;

use crate::error::KeyError;

/// Separator between key segments.
const SEPARATOR: char = ':';

/// Suffix of the key holding the ISO-8601 refresh timestamp.
const TIMESTAMP_SUFFIX: &str = "timestamp";

/// Suffix of the key holding the refresh lock sentinel.
const LOCK_SUFFIX: &str = "lock";

/// A validated `<prefix>:<id>` cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    prefix: String,
    id: String,
}

impl CacheKey {
    /// Create a key for resource class `prefix` and identifier `id`.
    pub fn new(prefix: impl Into<String>, id: impl Into<String>) -> Result<Self, KeyError> {
        let prefix = prefix.into();
        let id = id.into();
        validate_part("prefix", &prefix)?;
        validate_part("id", &id)?;
        Ok(Self { prefix, id })
    }

    /// Parse a `<prefix>:<id>` string.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        match s.split_once(SEPARATOR) {
            Some((prefix, id)) => Self::new(prefix, id),
            None => Err(KeyError::Malformed(s.to_string())),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Store key holding the serialized payload.
    pub fn value_key(&self) -> String {
        format!("{}{}{}", self.prefix, SEPARATOR, self.id)
    }

    /// Store key holding the timestamp of the last successful refresh.
    pub fn timestamp_key(&self) -> String {
        format!("{}{}{}", self.value_key(), SEPARATOR, TIMESTAMP_SUFFIX)
    }

    /// Store key holding the refresh lock sentinel.
    pub fn lock_key(&self) -> String {
        format!("{}{}{}", self.value_key(), SEPARATOR, LOCK_SUFFIX)
    }
}

fn validate_part(part: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::Empty { part });
    }
    if let Some(found) = value
        .chars()
        .find(|c| *c == SEPARATOR || c.is_whitespace() || c.is_control())
    {
        return Err(KeyError::ReservedCharacter {
            part,
            value: value.to_string(),
            found,
        });
    }
    Ok(())
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, SEPARATOR, self.id)
    }
}

impl FromStr for CacheKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

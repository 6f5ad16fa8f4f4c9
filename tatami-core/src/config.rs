//! Configuration types
//!
//! Built once at process start and handed to the store and coordinator.
//! Values come from environment variables with development defaults.

use std::time::Duration;

use crate::entry::{StalenessPolicy, DEFAULT_STALENESS};
use crate::error::ConfigError;

/// Default shared store URL.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default number of pooled store connections.
pub const DEFAULT_POOL_SIZE: usize = 20;

/// Default bound on a single store round-trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default lifetime of an abandoned refresh lock.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);

// ============================================================================
// STORE CONFIGURATION
// ============================================================================

/// Shared key-value store connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Connection URL, e.g. `redis://localhost:6379`
    pub url: String,
    /// Maximum pool size
    pub pool_size: usize,
    /// Connect and read timeout for each round-trip
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Create store configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TATAMI_REDIS_URL` (falls back to `REDIS_URL`)
    /// - `TATAMI_STORE_POOL_SIZE` (falls back to `PUMA_THREADS`, default: 20)
    /// - `TATAMI_STORE_TIMEOUT_SECS` (default: 3)
    pub fn from_env() -> Self {
        let url = std::env::var("TATAMI_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());

        Self {
            url,
            pool_size: env_parse_first(&["TATAMI_STORE_POOL_SIZE", "PUMA_THREADS"])
                .unwrap_or(DEFAULT_POOL_SIZE),
            timeout: env_secs("TATAMI_STORE_TIMEOUT_SECS").unwrap_or(DEFAULT_STORE_TIMEOUT),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "store.url".to_string(),
            });
        }
        if self.pool_size == 0 {
            return Err(invalid("store.pool_size", "0", "must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("store.timeout", "0s", "must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// REFRESH CONFIGURATION
// ============================================================================

/// Stale-while-revalidate settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Staleness window `D`
    pub staleness: StalenessPolicy,
    /// TTL on the refresh lock; the only recovery from a crashed holder
    pub lock_ttl: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            staleness: StalenessPolicy::new(DEFAULT_STALENESS),
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }
}

impl RefreshConfig {
    /// Create refresh configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TATAMI_CACHE_DURATION_SECS` (falls back to `CACHE_DURATION`, default: 60)
    /// - `TATAMI_LOCK_TTL_SECS` (default: 60)
    pub fn from_env() -> Self {
        Self {
            staleness: StalenessPolicy::new(
                env_parse_first::<u64>(&["TATAMI_CACHE_DURATION_SECS", "CACHE_DURATION"])
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_STALENESS),
            ),
            lock_ttl: env_secs("TATAMI_LOCK_TTL_SECS").unwrap_or(DEFAULT_LOCK_TTL),
        }
    }

    pub fn with_staleness(mut self, max_age: Duration) -> Self {
        self.staleness = StalenessPolicy::new(max_age);
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_ttl.is_zero() {
            return Err(invalid("refresh.lock_ttl", "0s", "must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// TOP-LEVEL CONFIGURATION
// ============================================================================

/// Everything the cache layer needs, passed explicitly by handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TatamiConfig {
    pub store: StoreConfig,
    pub refresh: RefreshConfig,
}

impl TatamiConfig {
    pub fn from_env() -> Self {
        Self {
            store: StoreConfig::from_env(),
            refresh: RefreshConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.refresh.validate()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// First of `keys` that is set and parses.
fn env_parse_first<T: std::str::FromStr>(keys: &[&str]) -> Option<T> {
    keys.iter().find_map(|key| env_parse(key))
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

//! Redis-backed key-value store.
//!
//! Uses deadpool-redis for connection pooling. Every round-trip, including
//! waiting for a pooled connection, is bounded by the configured store
//! timeout so a slow or partitioned Redis never blocks a reader for longer
//! than that.
//!
//! # Conditional writes
//!
//! - `set_if_absent` is `SET key value NX PX ttl`
//! - `delete_if_equals` is a compare-and-delete Lua script, so a holder whose
//!   lock already expired cannot delete a successor's lock

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::redis::{self, RedisError, Script};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, PoolError, Runtime, Timeouts};
use tatami_core::{ConfigError, StoreConfig, StoreError, StoreResult};

use crate::traits::KeyValueStore;

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis store shared by every coordinator instance.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    timeout: Duration,
    compare_and_delete: Script,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("pool_status", &self.pool.status())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisStore {
    /// Build a pooled store from configuration. No connection is opened yet.
    pub fn from_config(config: &StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(config.timeout);
        timeouts.create = Some(config.timeout);
        timeouts.recycle = Some(config.timeout);

        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts = timeouts;

        let mut cfg = Config::from_url(config.url.clone());
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ConfigError::InvalidValue {
                field: "store.url".to_string(),
                value: config.url.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            pool_size = config.pool_size,
            timeout_ms = config.timeout.as_millis() as u64,
            "Redis store pool created"
        );

        Ok(Self {
            pool,
            timeout: config.timeout,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        })
    }

    /// Number of pooled connections (idle and in use).
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn connection(&self) -> StoreResult<Connection> {
        self.pool.get().await.map_err(|e| pool_error(e, self.timeout))
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "Redis operation timed out");
                Err(StoreError::timeout(operation, self.timeout))
            }
        }
    }
}

fn redis_error(err: RedisError) -> StoreError {
    StoreError::unavailable(err.to_string())
}

fn pool_error(err: PoolError, timeout: Duration) -> StoreError {
    match err {
        PoolError::Timeout(_) => StoreError::timeout("pool checkout", timeout),
        PoolError::Backend(e) => redis_error(e),
        other => StoreError::Pool {
            reason: other.to_string(),
        },
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.bounded("GET", async {
            let mut conn = self.connection().await?;
            let value: Option<Vec<u8>> = redis::cmd("GET")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.bounded("SET", async {
            let mut conn = self.connection().await?;
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            Ok(())
        })
        .await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        self.bounded("SET NX", async {
            let mut conn = self.connection().await?;
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            Ok(reply.is_some())
        })
        .await
    }

    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        self.bounded("compare-and-delete", async {
            let mut conn = self.connection().await?;
            let deleted: i64 = self
                .compare_and_delete
                .key(key)
                .arg(expected)
                .invoke_async(&mut conn)
                .await
                .map_err(redis_error)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        self.bounded("PING", async {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            Ok(())
        })
        .await?;
        Ok(start.elapsed())
    }
}

//! TATAMI Storage - Shared Store, Lock and Refresh Coordinator
//!
//! Defines the key-value store abstraction every process shares, the
//! best-effort distributed lock built on its conditional writes, and the
//! stale-while-revalidate coordinator that ties them together.

pub mod cache;
pub mod lock;
pub mod memory;
pub mod mock;
pub mod redis_backend;
pub mod traits;

pub use traits::KeyValueStore;
pub use memory::InMemoryStore;
pub use redis_backend::RedisStore;
pub use lock::{DistributedLock, LockGuard, StoreLock};

// Re-export cache types for API integration
pub use cache::{
    producer_fn, CacheRead, FnProducer, Fetched, Producer, ReadSource, RefreshCoordinator,
    RefreshHandle, Refreshed,
};

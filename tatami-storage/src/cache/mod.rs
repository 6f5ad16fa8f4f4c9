//! Stale-while-revalidate cache over the shared store.
//!
//! Readers never wait on a refresh when something is cached, however old.
//! Only a cold key, with nothing to hand back, makes the caller wait for the
//! one process that won the refresh lock.
//!
//! # Outcomes
//!
//! [`RefreshCoordinator::fetch`] returns a [`Fetched`]:
//!
//! - `Ready(CacheRead)`: a value, tagged with where it came from
//!   ([`ReadSource::Fresh`], [`ReadSource::Stale`] or [`ReadSource::Refreshed`])
//! - `Failed`: the cold-miss refresh this call waited on did not succeed
//! - `Pending`: cold key and another process holds the lock; try again shortly
//!
//! # Example
//!
//! ```ignore
//! let coordinator = RefreshCoordinator::new(store, lock, RefreshConfig::default());
//! let key = CacheKey::new("competition", "42")?;
//!
//! match coordinator.fetch(&key, producer_fn(load_competition)).await? {
//!     Fetched::Ready(read) => serve(read.into_value()),
//!     Fetched::Pending => retry_later(),
//!     Fetched::Failed { error, .. } => report(error),
//! }
//! ```

pub mod freshness;
pub mod producer;
pub mod refresh;

pub use freshness::{CacheRead, ReadSource};
pub use producer::{producer_fn, FnProducer, Producer};
pub use refresh::{Fetched, RefreshCoordinator, RefreshHandle, Refreshed};

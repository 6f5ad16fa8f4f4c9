//! The expensive computation a refresh runs.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tatami_core::ProducerError;

/// Produces a fresh value for one cache key.
///
/// Called at most once per acquired refresh lock. Errors are relayed to a
/// cold-miss caller; a stale-path caller never sees them.
#[async_trait]
pub trait Producer<T>: Send + Sync {
    async fn produce(&self) -> Result<T, ProducerError>;
}

#[async_trait]
impl<T, P> Producer<T> for Arc<P>
where
    P: Producer<T> + ?Sized,
    T: Send + 'static,
{
    async fn produce(&self) -> Result<T, ProducerError> {
        (**self).produce().await
    }
}

/// [`Producer`] adapter for async closures. See [`producer_fn`].
#[derive(Clone)]
pub struct FnProducer<F> {
    f: F,
}

impl<F> fmt::Debug for FnProducer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProducer").finish_non_exhaustive()
    }
}

/// Wrap `Fn() -> impl Future<Output = Result<T, E>>` as a [`Producer`].
///
/// Any `E: Display` is converted to a [`ProducerError`] carrying its message.
pub fn producer_fn<F>(f: F) -> FnProducer<F> {
    FnProducer { f }
}

#[async_trait]
impl<T, F, Fut, E> Producer<T> for FnProducer<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send,
    E: fmt::Display + Send,
    T: Send + 'static,
{
    async fn produce(&self) -> Result<T, ProducerError> {
        (self.f)()
            .await
            .map_err(|e| ProducerError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_producer_fn_ok() {
        let producer = producer_fn(|| async { Ok::<_, ProducerError>(7u32) });
        assert_eq!(producer.produce().await, Ok(7));
    }

    #[tokio::test]
    async fn test_producer_fn_maps_display_errors() {
        let producer = producer_fn(|| async { Err::<u32, _>("upstream returned 500") });
        let err = producer.produce().await.expect_err("should fail");
        assert_eq!(err.message, "upstream returned 500");
    }

    #[tokio::test]
    async fn test_arc_producer_delegates() {
        let producer = Arc::new(producer_fn(|| async { Ok::<_, String>("v") }));
        assert_eq!(Producer::<&str>::produce(&producer).await, Ok("v"));
    }
}

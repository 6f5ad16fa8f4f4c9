//! Shared application state for Axum routers.

use std::sync::Arc;

use tatami_core::RefreshConfig;
use tatami_storage::{DistributedLock, KeyValueStore, RefreshCoordinator, StoreLock};

use crate::producer::CompetitionSource;

/// Coordinator over whichever store the binary was configured with.
pub type ApiCoordinator = RefreshCoordinator<dyn KeyValueStore, dyn DistributedLock>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ApiCoordinator>,
    /// Same store the coordinator uses, kept for readiness probes.
    pub store: Arc<dyn KeyValueStore>,
    pub source: Arc<dyn CompetitionSource>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the coordinator with a lock living in `store`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn CompetitionSource>,
        config: RefreshConfig,
    ) -> Self {
        let lock: Arc<dyn DistributedLock> = Arc::new(StoreLock::new(Arc::clone(&store)));
        let coordinator = RefreshCoordinator::new(Arc::clone(&store), lock, config);
        Self::with_coordinator(Arc::new(coordinator), store, source)
    }

    pub fn with_coordinator(
        coordinator: Arc<ApiCoordinator>,
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn CompetitionSource>,
    ) -> Self {
        Self {
            coordinator,
            store,
            source,
            start_time: std::time::Instant::now(),
        }
    }
}

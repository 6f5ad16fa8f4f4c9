//! TATAMI API - HTTP front for the refresh coordinator
//!
//! Serves competition documents from the shared cache, refreshing them from
//! the upstream source in the background once they go stale.

pub mod config;
pub mod error;
pub mod producer;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, UpstreamConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use producer::{CompetitionProducer, CompetitionSource, UpstreamClient, UpstreamError};
pub use routes::create_router;
pub use state::{ApiCoordinator, AppState};

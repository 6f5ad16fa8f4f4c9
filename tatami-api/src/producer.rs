//! Upstream source of competition documents.
//!
//! [`CompetitionSource`] is the seam between the route and the network: the
//! binary uses [`UpstreamClient`] over reqwest, tests plug in a stub.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tatami_core::ProducerError;
use tatami_storage::Producer;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::error::{ApiError, ApiResult};

/// Why an upstream fetch failed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("Upstream body is not JSON: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<UpstreamError> for ProducerError {
    fn from(err: UpstreamError) -> Self {
        ProducerError::new(err.to_string())
    }
}

/// Fetches one competition document by id.
#[async_trait]
pub trait CompetitionSource: Send + Sync {
    async fn fetch_competition(&self, id: &str) -> Result<Value, ProducerError>;
}

/// [`CompetitionSource`] over HTTP.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn from_config(config: &UpstreamConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn get(&self, id: &str) -> Result<Value, UpstreamError> {
        let url = self.config.url_for(id);
        tracing::debug!(%url, "Fetching competition from upstream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(UpstreamError::Decode)
    }
}

#[async_trait]
impl CompetitionSource for UpstreamClient {
    async fn fetch_competition(&self, id: &str) -> Result<Value, ProducerError> {
        self.get(id).await.map_err(|e| {
            tracing::warn!(competition_id = id, error = %e, "Upstream fetch failed");
            ProducerError::from(e)
        })
    }
}

/// Producer for one competition, handed to the refresh coordinator.
#[derive(Clone)]
pub struct CompetitionProducer {
    source: Arc<dyn CompetitionSource>,
    id: String,
}

impl CompetitionProducer {
    pub fn new(source: Arc<dyn CompetitionSource>, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }
}

#[async_trait]
impl Producer<Value> for CompetitionProducer {
    async fn produce(&self) -> Result<Value, ProducerError> {
        self.source.fetch_competition(&self.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed;

    #[async_trait]
    impl CompetitionSource for Fixed {
        async fn fetch_competition(&self, id: &str) -> Result<Value, ProducerError> {
            Ok(json!({ "id": id }))
        }
    }

    #[tokio::test]
    async fn test_producer_passes_id() {
        let producer = CompetitionProducer::new(Arc::new(Fixed), "17");
        assert_eq!(producer.produce().await, Ok(json!({ "id": "17" })));
    }

    #[test]
    fn test_status_error_message() {
        let err: ProducerError = UpstreamError::Status { status: 404 }.into();
        assert_eq!(err.message, "Upstream returned HTTP 404");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_producer_error() {
        let config = UpstreamConfig {
            url_template: "http://127.0.0.1:1/competitions/{id}.json".to_string(),
            timeout: std::time::Duration::from_millis(500),
        };
        let client = UpstreamClient::from_config(&config).expect("client builds");
        let err = client.fetch_competition("1").await.expect_err("nothing listens");
        assert!(err.message.starts_with("Upstream request failed"));
    }
}

//! API Configuration Module
//!
//! Bind address, CORS and upstream settings. Loaded from environment
//! variables with defaults suitable for development.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Default upstream the competition documents are fetched from.
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:8080/competitions/{id}.json";

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// UPSTREAM CONFIGURATION
// ============================================================================

/// Where competition documents come from on a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// URL template; `{id}` is replaced with the competition id.
    pub url_template: String,
    /// Timeout for one upstream request.
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_UPSTREAM_URL.to_string(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl UpstreamConfig {
    pub fn url_for(&self, id: &str) -> String {
        self.url_template.replace("{id}", id)
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    pub upstream: UpstreamConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            upstream: UpstreamConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TATAMI_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` or `TATAMI_API_PORT`: Port (default: 3000)
    /// - `TATAMI_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `TATAMI_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `TATAMI_UPSTREAM_URL`: Upstream URL template with an `{id}` placeholder
    /// - `TATAMI_UPSTREAM_TIMEOUT_SECS`: Upstream request timeout (default: 30)
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but does not parse.
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let host = std::env::var("TATAMI_API_BIND").unwrap_or(defaults.host);

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("TATAMI_API_PORT").ok())
        {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let cors_origins = std::env::var("TATAMI_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("TATAMI_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let url_template =
            std::env::var("TATAMI_UPSTREAM_URL").unwrap_or(defaults.upstream.url_template);

        let timeout = match std::env::var("TATAMI_UPSTREAM_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ApiError::invalid_input(format!("Invalid upstream timeout: {}", raw))
            })?,
            Err(_) => defaults.upstream.timeout,
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            cors_max_age_secs,
            upstream: UpstreamConfig {
                url_template,
                timeout,
            },
        })
    }

    /// Resolve the socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}

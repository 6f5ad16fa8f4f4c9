//! Error Types for TATAMI API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tatami_core::{ConfigError, KeyError, RefreshError, StoreError, TatamiError, Timestamp};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    // ========================================================================
    // Upstream Errors (502, 503)
    // ========================================================================
    /// The refresh this request waited on failed
    UpstreamFailed,

    /// Nothing cached yet and another instance is refreshing
    RefreshPending,

    /// The shared store could not be reached
    StoreUnavailable,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::RefreshPending | ErrorCode::StoreUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::UpstreamFailed => "Upstream source failed",
            ErrorCode::RefreshPending => "Value is being refreshed, retry shortly",
            ErrorCode::StoreUnavailable => "Cache store is unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }

    /// Seconds a client should wait before retrying, sent as `Retry-After`.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ErrorCode::RefreshPending => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntityNotFound, message)
    }

    pub fn refresh_pending() -> Self {
        Self::from_code(ErrorCode::RefreshPending)
    }

    /// The cold-miss refresh failed. Carries the failure kind and when the
    /// refresh finished.
    pub fn upstream_failed(error: &RefreshError, completed_at: Timestamp) -> Self {
        Self::new(ErrorCode::UpstreamFailed, error.to_string()).with_details(serde_json::json!({
            "kind": error.kind().to_string(),
            "completed_at": tatami_core::encode_timestamp(completed_at),
        }))
    }

    /// A cold-miss refresh failed. A failed write is a store outage and is
    /// reported like any other store error; everything else is upstream.
    pub fn refresh_failed(error: &RefreshError, completed_at: Timestamp) -> Self {
        match error {
            RefreshError::Store(store_error) => store_error.clone().into(),
            _ => Self::upstream_failed(error, completed_at),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.code.retry_after_secs();
        let mut response = (status, Json(self)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// ============================================================================
// CONVERSIONS FROM TATAMI ERRORS
// ============================================================================

/// Store failures surface as 503; internal details are logged, not returned.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Cache store error");
        ApiError::store_unavailable("Cache store is unavailable")
    }
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(format!("Configuration error: {}", err))
    }
}

impl From<TatamiError> for ApiError {
    fn from(err: TatamiError) -> Self {
        match err {
            TatamiError::Store(e) => e.into(),
            TatamiError::Key(e) => e.into(),
            TatamiError::Config(e) => e.into(),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tatami_core::ProducerError;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EntityNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::UpstreamFailed.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::RefreshPending.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::StoreUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::RefreshPending).expect("serialize");
        assert_eq!(json, "\"REFRESH_PENDING\"");
    }

    #[test]
    fn test_pending_sets_retry_after() {
        let response = ApiError::refresh_pending().into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from_static("1"))
        );

        let response = ApiError::store_unavailable("down").into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_upstream_failed_details() {
        let error = RefreshError::Producer(ProducerError::new("HTTP 500"));
        let completed_at = tatami_core::decode_timestamp(b"2024-05-01T10:00:00.250Z").expect("valid");
        let err = ApiError::upstream_failed(&error, completed_at);

        assert_eq!(err.code, ErrorCode::UpstreamFailed);
        assert!(err.message.contains("HTTP 500"));
        let details = err.details.expect("details");
        assert_eq!(details["kind"], "producer");
        assert_eq!(details["completed_at"], "2024-05-01T10:00:00.250Z");
    }

    #[test]
    fn test_refresh_failed_hides_store_detail() {
        let completed_at = tatami_core::decode_timestamp(b"2024-05-01T10:00:00.250Z").expect("valid");

        let error = RefreshError::Store(StoreError::unavailable("redis://cache-7:6379 READONLY"));
        let err = ApiError::refresh_failed(&error, completed_at);
        assert_eq!(err.code, ErrorCode::StoreUnavailable);
        assert_eq!(err.message, "Cache store is unavailable");
        assert!(err.details.is_none());

        let error = RefreshError::Producer(ProducerError::new("HTTP 500"));
        let err = ApiError::refresh_failed(&error, completed_at);
        assert_eq!(err.code, ErrorCode::UpstreamFailed);
    }

    #[test]
    fn test_tatami_error_conversion() {
        let err: ApiError =
            TatamiError::Store(StoreError::timeout("GET", Duration::from_secs(3))).into();
        assert_eq!(err.code, ErrorCode::StoreUnavailable);
        assert!(!err.message.contains("GET"));

        let err: ApiError = TatamiError::Key(KeyError::Malformed("x".to_string())).into();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::not_found("competition 9");
        assert_eq!(err.to_string(), "EntityNotFound: competition 9");
    }
}

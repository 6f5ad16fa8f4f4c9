//! Competition documents, served stale-while-revalidate.
//!
//! `GET /competitions/{id}.json`
//!
//! | Outcome                       | Status | Notes                              |
//! |-------------------------------|--------|------------------------------------|
//! | cached or refreshed value     | 200    | `x-cache-status`, `last-modified`  |
//! | cold, refreshing elsewhere    | 503    | `retry-after: 1`                   |
//! | cold, refresh failed          | 502    | failure kind in `details`          |
//! | store unreachable             | 503    |                                    |

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tatami_core::{CacheKey, Timestamp};
use tatami_storage::{CacheRead, Fetched};

use crate::error::{ApiError, ApiResult};
use crate::producer::CompetitionProducer;
use crate::state::AppState;

/// Store key prefix for competition documents.
pub const COMPETITION_PREFIX: &str = "competition";

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

/// Strip the `.json` suffix and check the id is safe to use as a key and in
/// the upstream URL.
fn parse_competition_file(file: &str) -> ApiResult<&str> {
    let id = file
        .strip_suffix(".json")
        .ok_or_else(|| ApiError::not_found(format!("No such resource: {}", file)))?;

    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::invalid_input(format!(
            "Invalid competition id: {:?}",
            id
        )));
    }
    Ok(id)
}

fn http_date(timestamp: Timestamp) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn ready_response(read: CacheRead<Value>) -> Response {
    let source = read.source();
    let stored_at = read.stored_at();

    let mut response = Json(read.into_value()).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(source.as_str()));
    if let Some(stored_at) = stored_at {
        if let Ok(value) = HeaderValue::from_str(&http_date(stored_at)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
    response
}

/// GET /competitions/{id}.json
pub async fn get_competition(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    let id = parse_competition_file(&file)?;
    let key = CacheKey::new(COMPETITION_PREFIX, id)?;
    let producer = CompetitionProducer::new(state.source.clone(), id);

    match state.coordinator.fetch(&key, producer).await? {
        Fetched::Ready(read) => {
            tracing::debug!(key = %key, cache_status = %read.source(), "Serving competition");
            Ok(ready_response(read))
        }
        Fetched::Pending => {
            tracing::info!(key = %key, "Competition not cached yet, refresh running elsewhere");
            Err(ApiError::refresh_pending())
        }
        Fetched::Failed {
            error,
            completed_at,
        } => {
            tracing::warn!(key = %key, kind = %error.kind(), error = %error, "Competition refresh failed");
            Err(ApiError::refresh_failed(&error, completed_at))
        }
    }
}

pub fn create_router() -> Router<AppState> {
    // matchit cannot split `:id.json` inside one segment; the suffix is
    // stripped in the handler.
    Router::new().route("/:file", get(get_competition))
}

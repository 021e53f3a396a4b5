use crate::error::ApiError;
use crate::routes::functions::upstream_status;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use marketsnipe_core::PostSummary;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct RedditMetaRequest {
    #[serde(default)]
    url: Option<String>,
}

/// `POST /api/reddit-meta`
///
/// Cached lookups return at once; everything else waits its turn behind
/// the paced worker. Any failure after the missing-URL check is a 500.
pub async fn reddit_meta(
    State(state): State<AppState>,
    payload: Result<Json<RedditMetaRequest>, JsonRejection>,
) -> Result<Json<PostSummary>, ApiError> {
    let Json(request) = payload?;
    let url = request.url.unwrap_or_default();
    if url.trim().is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }

    info!("Received lookup: {}", url);
    let summary = state.reddit_queue.submit(&url).await.map_err(|e| {
        match upstream_status(&e) {
            Some(status) => {
                error!("Reddit fetch failed for {}: {}", url, e);
                ApiError::internal(format!("Reddit fetch failed: {}", status))
            }
            None => ApiError::from(e).into_server_error(),
        }
    })?;

    Ok(Json(summary))
}

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use marketsnipe_core::UpstreamMetrics;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub queue_length: usize,
    pub cache_entries: usize,
    pub upstream: UpstreamMetrics,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue_length: state.reddit_queue.queue_len(),
        cache_entries: state.reddit_queue.cache().len().await,
        upstream: state.metrics.get_metrics().await,
    })
}

//! Health check HTTP routes

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::queue::QueueStatsReader;

/// Shared state for the health router.
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<QueueStatsReader>,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
}

/// GET /health/live - Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(LivenessResponse { status: "alive" }))
}

/// GET /health/queues - Queue depth snapshot
///
/// Always 200: a degraded snapshot reports `degraded: true` instead of an
/// error status, so probes distinguish "worker up, store down" from "down".
pub async fn queue_stats(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.stats.snapshot().await;
    (StatusCode::OK, Json(snapshot))
}

/// GET /metrics - Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    (StatusCode::OK, body)
}

/// Build the health/stats router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness_check))
        .route("/health/queues", get(queue_stats))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

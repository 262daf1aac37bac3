//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::api::state::ApiState;
use crate::api::types::HealthResponse;

/// GET /health
///
/// The exporter itself is alive whenever it answers; database reachability is
/// reported alongside but does not change the status.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let (databases_up, databases_down) = state.metrics.database_counts();

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        jobs: state.jobs,
        databases_up,
        databases_down,
    })
}

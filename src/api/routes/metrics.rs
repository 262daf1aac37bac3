//! Prometheus scrape endpoint

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api::error::ApiResult;
use crate::api::state::ApiState;
use crate::metrics::TEXT_CONTENT_TYPE;

/// GET /metrics
///
/// The latest value of every gauge in the text exposition format
pub async fn scrape(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body))
}

//! Health endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::server::state::AppState;

/// GET /api/v1/health
///
/// 200 while the service is healthy or degraded, 503 once more than one
/// component is down.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.monitor().health().await;
    let code = if status.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(status))
}

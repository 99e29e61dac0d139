//! Per-request API metrics recording

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

use super::extract::RequestUserSlot;
use super::state::AppState;

/// Record one metrics sample per request.
///
/// Health checks are skipped to keep probe noise out of the usage numbers.
/// The sink is append-only and a write failure never affects the response.
pub async fn track_metrics(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();

    let slot = RequestUserSlot::default();
    req.extensions_mut().insert(slot.clone());

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis() as i64;

    if path != "/api/v1/health" {
        let status = response.status();
        let error = if status.is_client_error() || status.is_server_error() {
            status.canonical_reason()
        } else {
            None
        };
        let user_id = slot.0.get().cloned();

        if let Err(e) = state.db().insert_metric(
            &path,
            &method,
            status.as_u16(),
            elapsed_ms,
            user_id.as_deref(),
            error,
        ) {
            tracing::warn!("failed to record API metric: {e}");
        }
    }

    response
}

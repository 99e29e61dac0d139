//! HTTP server assembly

pub mod extract;
pub mod metrics;
pub mod routes;
pub mod state;

use axum::{middleware, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{Error, Result};

pub use state::AppState;

/// Build the full router with middleware layers
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload = state.settings().max_file_size_bytes();

    Router::new()
        .nest("/api/v1", routes::api_routes(max_upload))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics::track_metrics,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Bind and serve until shutdown
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.settings().host, state.settings().port)
        .parse()
        .map_err(|e| Error::internal(format!("Invalid bind address: {e}")))?;

    let router = build_router(state);

    tracing::info!("Starting server on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal(format!("Failed to bind {addr}: {e}")))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| Error::internal(format!("Server error: {e}")))?;

    Ok(())
}

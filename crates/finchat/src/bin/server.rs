//! Server binary

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use finchat::providers::{GeminiChat, GeminiEmbedder};
use finchat::server::{serve, AppState};
use finchat::storage::Database;
use finchat::vector::MemoryVectorIndex;
use finchat::{Result, Settings};

/// How often the idle-session sweeper runs
const EVICTION_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    tracing::info!(
        chat_model = %settings.gemini_chat_model,
        embedding_model = %settings.gemini_embedding_model,
        "starting finchat"
    );

    let db = Database::new(&settings.database_path)?;
    let embedder = Arc::new(GeminiEmbedder::new(settings.google_api_key.clone())?);
    let chat = Arc::new(GeminiChat::new(settings.google_api_key.clone())?);
    let index = Arc::new(MemoryVectorIndex::new());

    let state = AppState::new(settings, db, index, embedder, chat)?;

    // Background sweep for idle sessions; the retention window is
    // live-reloadable through the admin config surface
    let sweeper_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            let retention_days = sweeper_state.config().snapshot().session_retention_days;
            if let Err(e) = sweeper_state.sessions().evict_idle(retention_days) {
                tracing::warn!("session eviction sweep failed: {e}");
            }
        }
    });

    serve(state).await
}

//! Shared application state

use std::sync::Arc;

use crate::admin::{
    ActivityLogger, AdminDocumentService, AdminUserService, AnalyticsService, ConfigManager,
    SystemMonitorService,
};
use crate::auth::AuthService;
use crate::config::Settings;
use crate::error::Result;
use crate::ingestion::IngestionPipeline;
use crate::providers::chat::ChatProvider;
use crate::providers::embedding::EmbeddingProvider;
use crate::rag::RagEngine;
use crate::sessions::SessionStore;
use crate::storage::Database;
use crate::vector::{VectorIndex, VectorStore};

/// Shared application state, cheap to clone
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: Settings,
    db: Arc<Database>,
    vector_store: Arc<VectorStore>,
    sessions: Arc<SessionStore>,
    auth: Arc<AuthService>,
    engine: Arc<RagEngine>,
    pipeline: Arc<IngestionPipeline>,
    config: Arc<ConfigManager>,
    activity: Arc<ActivityLogger>,
    admin_users: Arc<AdminUserService>,
    admin_documents: Arc<AdminDocumentService>,
    monitor: Arc<SystemMonitorService>,
    analytics: Arc<AnalyticsService>,
}

impl AppState {
    /// Wire up all services from startup settings and providers
    pub fn new(
        settings: Settings,
        db: Database,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        let db = Arc::new(db);
        let vector_store = Arc::new(VectorStore::new(index));
        let activity = Arc::new(ActivityLogger::new(Arc::clone(&db)));
        let config = Arc::new(ConfigManager::new(
            Arc::clone(&db),
            Arc::clone(&activity),
            &settings,
        )?);
        let sessions = Arc::new(SessionStore::new(Arc::clone(&db)));
        let auth = Arc::new(AuthService::new(
            Arc::clone(&db),
            Arc::clone(&config),
            &settings.jwt_secret_key,
        ));

        let engine = Arc::new(RagEngine::new(
            Arc::clone(&vector_store),
            Arc::clone(&embedder),
            Arc::clone(&chat),
            Arc::clone(&sessions),
            Arc::clone(&config),
        ));
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&vector_store),
            embedder,
            Arc::clone(&config),
        ));

        let admin_users = Arc::new(AdminUserService::new(
            Arc::clone(&db),
            Arc::clone(&auth),
            Arc::clone(&activity),
        ));
        let admin_documents = Arc::new(AdminDocumentService::new(
            Arc::clone(&db),
            Arc::clone(&vector_store),
            Arc::clone(&activity),
        ));
        let monitor = Arc::new(SystemMonitorService::new(
            Arc::clone(&db),
            Arc::clone(&vector_store),
            Arc::clone(&chat),
        ));
        let analytics = Arc::new(AnalyticsService::new(Arc::clone(&db)));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                settings,
                db,
                vector_store,
                sessions,
                auth,
                engine,
                pipeline,
                config,
                activity,
                admin_users,
                admin_documents,
                monitor,
                analytics,
            }),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.inner.db
    }

    pub fn vector_store(&self) -> &Arc<VectorStore> {
        &self.inner.vector_store
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.inner.sessions
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.inner.auth
    }

    pub fn engine(&self) -> &Arc<RagEngine> {
        &self.inner.engine
    }

    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.inner.pipeline
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.inner.config
    }

    pub fn activity(&self) -> &Arc<ActivityLogger> {
        &self.inner.activity
    }

    pub fn admin_users(&self) -> &Arc<AdminUserService> {
        &self.inner.admin_users
    }

    pub fn admin_documents(&self) -> &Arc<AdminDocumentService> {
        &self.inner.admin_documents
    }

    pub fn monitor(&self) -> &Arc<SystemMonitorService> {
        &self.inner.monitor
    }

    pub fn analytics(&self) -> &Arc<AnalyticsService> {
        &self.inner.analytics
    }
}

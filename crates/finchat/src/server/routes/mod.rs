//! API route handlers

pub mod admin;
pub mod auth;
pub mod chat;
pub mod documents;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::server::state::AppState;

/// Build all /api/v1 routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        // Chat
        .route("/chat", post(chat::chat_query))
        // Documents - larger body limit for multipart uploads
        .route(
            "/documents/upload",
            post(documents::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/documents", get(documents::list))
        .route("/documents/stats", get(documents::stats))
        .route("/documents/:id", delete(documents::remove))
        // Health
        .route("/health", get(health::health))
        // Admin: users
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", get(admin::user_details))
        .route("/admin/users/:id/status", put(admin::update_user_status))
        .route("/admin/users/:id/reset-password", post(admin::reset_user_password))
        .route("/admin/users/:id/activity", get(admin::user_activity))
        // Admin: documents
        .route("/admin/documents", get(admin::list_documents))
        .route("/admin/documents/stats", get(admin::document_stats))
        .route("/admin/documents/:id", delete(admin::delete_document))
        // Admin: system
        .route("/admin/system/health", get(admin::system_health))
        .route("/admin/system/metrics", get(admin::system_metrics))
        .route("/admin/system/storage", get(admin::system_storage))
        .route("/admin/system/api-usage", get(admin::api_usage))
        .route("/admin/system/logs", get(admin::error_logs))
        // Admin: analytics
        .route("/admin/analytics/users", get(admin::analytics_users))
        .route("/admin/analytics/sessions", get(admin::analytics_sessions))
        .route("/admin/analytics/documents", get(admin::analytics_documents))
        // Admin: activity audit
        .route("/admin/activity", get(admin::activity_logs))
        // Admin: config
        .route("/admin/config", get(admin::list_config))
        .route("/admin/config/:name", get(admin::get_config))
        .route("/admin/config/:name", put(admin::update_config))
}

//! Admin endpoints: users, documents, system, analytics, audit, config

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::server::extract::AdminUser;
use crate::server::state::AppState;
use crate::types::activity::ActivityEntry;
use crate::types::admin::{
    clamp_pagination, ActivityLogParams, ActivityLogResponse, AdminDocumentInfo, ApiUsageMetrics,
    ConfigUpdateRequest, DocumentStatistics, HealthStatus, Page, PasswordResetResponse,
    SessionAnalytics, StorageMetrics, UserAnalytics, UserDetail, UserListParams, UserStatusUpdate,
    default_page, default_page_size,
};
use crate::types::document::DocumentDeleteResponse;
use crate::types::settings::ConfigSetting;
use crate::types::user::UserView;

// ==================== Users ====================

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(params): Query<UserListParams>,
) -> Result<Json<Page<UserView>>> {
    tracing::info!(admin = %admin.user.username, "listing users");
    Ok(Json(state.admin_users().list(&params)?))
}

/// GET /api/v1/admin/users/{id}
pub async fn user_details(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserDetail>> {
    Ok(Json(state.admin_users().details(&user_id)?))
}

/// PUT /api/v1/admin/users/{id}/status
pub async fn update_user_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
    Json(body): Json<UserStatusUpdate>,
) -> Result<Json<serde_json::Value>> {
    state.admin_users().set_status(
        &user_id,
        body.is_active,
        body.reason.as_deref(),
        &admin.actor,
    )?;
    Ok(Json(serde_json::json!({
        "success": true,
        "user_id": user_id,
        "is_active": body.is_active,
    })))
}

/// POST /api/v1/admin/users/{id}/reset-password
pub async fn reset_user_password(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<PasswordResetResponse>> {
    let temporary_password = state.admin_users().reset_password(&user_id, &admin.actor)?;
    Ok(Json(PasswordResetResponse {
        success: true,
        temporary_password,
        message: "Temporary password generated. The user must change it at next login."
            .to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

/// GET /api/v1/admin/users/{id}/activity
pub async fn user_activity(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ActivityLogResponse>> {
    let (page, page_size) = clamp_pagination(params.page, params.page_size);
    let (logs, total) = state
        .admin_users()
        .user_activity(&user_id, page, page_size)?;
    Ok(Json(activity_page(logs, total, page, page_size)))
}

// ==================== Documents ====================

#[derive(Debug, Deserialize)]
pub struct DocumentListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub search: Option<String>,
}

/// GET /api/v1/admin/documents
pub async fn list_documents(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<DocumentListParams>,
) -> Result<Json<Page<AdminDocumentInfo>>> {
    Ok(Json(state.admin_documents().list(
        params.page,
        params.page_size,
        params.search.as_deref().filter(|s| !s.is_empty()),
    )?))
}

/// DELETE /api/v1/admin/documents/{id}
pub async fn delete_document(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentDeleteResponse>> {
    let chunks_deleted = state
        .admin_documents()
        .delete(&document_id, &admin.actor)
        .await?;
    Ok(Json(DocumentDeleteResponse {
        success: true,
        chunks_deleted,
    }))
}

/// GET /api/v1/admin/documents/stats
pub async fn document_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<DocumentStatistics>> {
    Ok(Json(state.admin_documents().statistics().await?))
}

// ==================== System ====================

/// GET /api/v1/admin/system/health
pub async fn system_health(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<HealthStatus>> {
    Ok(Json(state.monitor().health().await))
}

/// GET /api/v1/admin/system/metrics
pub async fn system_metrics(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<serde_json::Value>> {
    let index = state.vector_store().stats().await?;
    let storage = state.monitor().storage().await?;
    Ok(Json(serde_json::json!({
        "index": index,
        "storage": storage,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// GET /api/v1/admin/system/storage
pub async fn system_storage(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<StorageMetrics>> {
    Ok(Json(state.monitor().storage().await?))
}

#[derive(Debug, Deserialize)]
pub struct UsageParams {
    #[serde(default = "default_usage_hours")]
    pub hours: i64,
}

fn default_usage_hours() -> i64 {
    24
}

/// GET /api/v1/admin/system/api-usage?hours=1-168
pub async fn api_usage(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<UsageParams>,
) -> Result<Json<ApiUsageMetrics>> {
    Ok(Json(state.monitor().api_usage(params.hours)?))
}

#[derive(Debug, Deserialize)]
pub struct ErrorLogParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Lowest HTTP status treated as an error
    #[serde(default = "default_min_status")]
    pub min_status: u16,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

fn default_min_status() -> u16 {
    400
}

/// GET /api/v1/admin/system/logs
pub async fn error_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ErrorLogParams>,
) -> Result<Json<serde_json::Value>> {
    let (page, page_size) = clamp_pagination(params.page, params.page_size);
    let (logs, total) = state.monitor().error_logs(
        params.min_status,
        params.start_date,
        params.end_date,
        page,
        page_size,
    )?;
    Ok(Json(serde_json::json!({
        "logs": logs,
        "total": total,
        "page": page,
        "page_size": page_size,
    })))
}

// ==================== Analytics ====================

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default = "default_analytics_days")]
    pub days: i64,
}

fn default_analytics_days() -> i64 {
    30
}

/// GET /api/v1/admin/analytics/users?days=1-365
pub async fn analytics_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<UserAnalytics>> {
    Ok(Json(state.analytics().users(params.days)?))
}

/// GET /api/v1/admin/analytics/sessions?days=1-365
pub async fn analytics_sessions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<SessionAnalytics>> {
    Ok(Json(state.analytics().sessions(params.days)?))
}

/// GET /api/v1/admin/analytics/documents
pub async fn analytics_documents(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<DocumentStatistics>> {
    Ok(Json(state.admin_documents().statistics().await?))
}

// ==================== Activity audit ====================

/// GET /api/v1/admin/activity
pub async fn activity_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ActivityLogParams>,
) -> Result<Json<ActivityLogResponse>> {
    let (page, page_size) = clamp_pagination(params.page, params.page_size);
    let (logs, total) = state.activity().list(
        params.admin_id.as_deref(),
        params.action.as_deref(),
        None,
        params.start_date,
        params.end_date,
        page,
        page_size,
    )?;
    Ok(Json(activity_page(logs, total, page, page_size)))
}

// ==================== Config ====================

/// GET /api/v1/admin/config
pub async fn list_config(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<serde_json::Value>> {
    let settings = state.config().list()?;
    Ok(Json(serde_json::json!({
        "total": settings.len(),
        "settings": settings,
    })))
}

/// GET /api/v1/admin/config/{name}
pub async fn get_config(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(name): Path<String>,
) -> Result<Json<ConfigSetting>> {
    Ok(Json(state.config().get(&name)?))
}

/// PUT /api/v1/admin/config/{name}
pub async fn update_config(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(name): Path<String>,
    Json(body): Json<ConfigUpdateRequest>,
) -> Result<Json<ConfigSetting>> {
    Ok(Json(state.config().update(&name, &body.value, &admin.actor)?))
}

fn activity_page(
    logs: Vec<ActivityEntry>,
    total: i64,
    page: i64,
    page_size: i64,
) -> ActivityLogResponse {
    ActivityLogResponse {
        logs,
        total,
        page,
        page_size,
        total_pages: (total + page_size - 1) / page_size,
    }
}

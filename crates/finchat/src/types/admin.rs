//! Admin API request/response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::activity::ActivityEntry;
use crate::types::user::UserView;

/// Pagination bounds applied to every paginated admin listing
pub const MIN_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Clamp a requested page/page_size pair to the allowed bounds
pub fn clamp_pagination(page: i64, page_size: i64) -> (i64, i64) {
    (page.max(1), page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE))
}

/// A page of results with totals
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = (total + page_size - 1) / page_size;
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Query parameters for the admin user listing
#[derive(Debug, Deserialize)]
pub struct UserListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

pub fn default_page() -> i64 {
    1
}

pub fn default_page_size() -> i64 {
    50
}

/// Detailed user view for the admin surface
#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserView,
    pub updated_at: DateTime<Utc>,
    pub document_count: i64,
    pub query_count: i64,
}

/// Status toggle request body
#[derive(Debug, Deserialize)]
pub struct UserStatusUpdate {
    pub is_active: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response carrying a one-time temporary password
#[derive(Debug, Serialize)]
pub struct PasswordResetResponse {
    pub success: bool,
    /// Returned exactly once; never stored in plaintext
    pub temporary_password: String,
    pub message: String,
}

/// Admin document listing entry with uploader attribution
#[derive(Debug, Serialize)]
pub struct AdminDocumentInfo {
    pub document_id: String,
    pub filename: String,
    pub uploader_username: String,
    pub upload_date: DateTime<Utc>,
    pub file_type: String,
    pub chunk_count: i64,
    pub file_size_bytes: i64,
}

/// Aggregate document statistics
#[derive(Debug, Serialize)]
pub struct DocumentStatistics {
    pub total_documents: i64,
    pub total_chunks: i64,
    pub total_size_mb: f64,
    pub avg_chunks_per_doc: f64,
    pub documents_by_type: Vec<TypeCount>,
    pub upload_trend: Vec<DayCount>,
}

/// Count of documents sharing a file type
#[derive(Debug, Serialize)]
pub struct TypeCount {
    pub file_type: String,
    pub count: i64,
    pub percentage: f64,
}

/// Count bucketed by calendar day
#[derive(Debug, Clone, Serialize)]
pub struct DayCount {
    pub date: String,
    pub count: i64,
}

/// Per-component health status
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// healthy, degraded, or unhealthy
    pub status: String,
    pub record_store_status: String,
    pub vector_index_status: String,
    pub llm_api_status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub error_details: serde_json::Map<String, serde_json::Value>,
}

/// API usage metrics over a time window
#[derive(Debug, Serialize)]
pub struct ApiUsageMetrics {
    pub window_hours: i64,
    pub total_requests: i64,
    pub error_count: i64,
    pub error_rate: f64,
    pub avg_response_ms: f64,
    pub by_endpoint: Vec<EndpointUsage>,
}

/// Per-endpoint usage rollup
#[derive(Debug, Serialize)]
pub struct EndpointUsage {
    pub endpoint: String,
    pub method: String,
    pub requests: i64,
    pub errors: i64,
    pub avg_response_ms: f64,
}

/// Storage footprint metrics
#[derive(Debug, Serialize)]
pub struct StorageMetrics {
    pub total_documents: i64,
    pub total_chunks: i64,
    pub approximate_bytes: i64,
    pub session_count: i64,
    pub message_count: i64,
}

/// User engagement analytics over a day window
#[derive(Debug, Serialize)]
pub struct UserAnalytics {
    pub window_days: i64,
    pub total_users: i64,
    pub active_users: i64,
    pub daily_active_users: Vec<DayCount>,
    pub top_users: Vec<TopUser>,
}

/// A user ranked by query volume
#[derive(Debug, Serialize)]
pub struct TopUser {
    pub user_id: String,
    pub username: String,
    pub query_count: i64,
}

/// Session analytics over a day window
#[derive(Debug, Serialize)]
pub struct SessionAnalytics {
    pub window_days: i64,
    pub total_sessions: i64,
    pub avg_messages_per_session: f64,
    pub session_trend: Vec<DayCount>,
}

/// Query parameters for activity log listings
#[derive(Debug, Deserialize)]
pub struct ActivityLogParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub admin_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// A page of activity log entries
#[derive(Debug, Serialize)]
pub struct ActivityLogResponse {
    pub logs: Vec<ActivityEntry>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// Config update request body
#[derive(Debug, Deserialize)]
pub struct ConfigUpdateRequest {
    pub value: serde_json::Value,
}

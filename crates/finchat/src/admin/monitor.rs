//! System health and usage monitoring

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::error::Result;
use crate::providers::chat::ChatProvider;
use crate::storage::Database;
use crate::types::admin::{ApiUsageMetrics, EndpointUsage, HealthStatus, StorageMetrics};
use crate::vector::VectorStore;

/// API usage windows are clamped to 1-168 hours
pub const MAX_USAGE_WINDOW_HOURS: i64 = 168;

/// Health, usage, storage, and error-log views for the admin surface
pub struct SystemMonitorService {
    db: Arc<Database>,
    vector_store: Arc<VectorStore>,
    chat: Arc<dyn ChatProvider>,
}

impl SystemMonitorService {
    pub fn new(db: Arc<Database>, vector_store: Arc<VectorStore>, chat: Arc<dyn ChatProvider>) -> Self {
        Self {
            db,
            vector_store,
            chat,
        }
    }

    /// Per-component health rolled up to healthy/degraded/unhealthy.
    ///
    /// One failing component degrades the service; more than one marks it
    /// unhealthy.
    pub async fn health(&self) -> HealthStatus {
        let mut error_details = serde_json::Map::new();
        let mut unhealthy = 0usize;

        let record_store_status = match self.db.ping() {
            Ok(()) => "healthy".to_string(),
            Err(e) => {
                error_details.insert("record_store".to_string(), serde_json::json!(e.to_string()));
                unhealthy += 1;
                "unhealthy".to_string()
            }
        };

        let vector_index_status = match self.vector_store.health_check().await {
            Ok(true) => "healthy".to_string(),
            Ok(false) => {
                unhealthy += 1;
                "unhealthy".to_string()
            }
            Err(e) => {
                error_details.insert("vector_index".to_string(), serde_json::json!(e.to_string()));
                unhealthy += 1;
                "unhealthy".to_string()
            }
        };

        let llm_api_status = match self.chat.health_check().await {
            Ok(true) => "healthy".to_string(),
            Ok(false) => {
                unhealthy += 1;
                "unhealthy".to_string()
            }
            Err(e) => {
                error_details.insert("llm_api".to_string(), serde_json::json!(e.to_string()));
                // An unreachable LLM degrades rather than kills the service;
                // queries still fall back to the canned refusal
                "degraded".to_string()
            }
        };

        let status = match unhealthy {
            0 if llm_api_status == "healthy" => "healthy",
            0 => "degraded",
            1 => "degraded",
            _ => "unhealthy",
        };

        HealthStatus {
            status: status.to_string(),
            record_store_status,
            vector_index_status,
            llm_api_status,
            timestamp: Utc::now(),
            error_details,
        }
    }

    /// API usage over the last `hours` (clamped to 1-168)
    pub fn api_usage(&self, hours: i64) -> Result<ApiUsageMetrics> {
        let hours = hours.clamp(1, MAX_USAGE_WINDOW_HOURS);
        let cutoff = Utc::now() - Duration::hours(hours);

        let rows = self.db.usage_since(cutoff)?;
        let total_requests: i64 = rows.iter().map(|r| r.2).sum();
        let error_count: i64 = rows.iter().map(|r| r.3).sum();
        let weighted_ms: f64 = rows.iter().map(|r| r.4 * r.2 as f64).sum();

        Ok(ApiUsageMetrics {
            window_hours: hours,
            total_requests,
            error_count,
            error_rate: if total_requests > 0 {
                (error_count as f64 / total_requests as f64 * 10_000.0).round() / 100.0
            } else {
                0.0
            },
            avg_response_ms: if total_requests > 0 {
                (weighted_ms / total_requests as f64 * 100.0).round() / 100.0
            } else {
                0.0
            },
            by_endpoint: rows
                .into_iter()
                .map(|(endpoint, method, requests, errors, avg_ms)| EndpointUsage {
                    endpoint,
                    method,
                    requests,
                    errors,
                    avg_response_ms: (avg_ms * 100.0).round() / 100.0,
                })
                .collect(),
        })
    }

    /// Error log slice with severity floor and date range
    pub fn error_logs(
        &self,
        min_status: u16,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<serde_json::Value>, i64)> {
        self.db.error_metrics(start, end, min_status, page, page_size)
    }

    /// Storage footprint across the record store and the index
    pub async fn storage(&self) -> Result<StorageMetrics> {
        let docs = self.db.list_documents()?;
        Ok(StorageMetrics {
            total_documents: docs.len() as i64,
            total_chunks: self.vector_store.count().await? as i64,
            approximate_bytes: docs.iter().map(|d| d.file_size_bytes).sum(),
            session_count: self.db.count_sessions()?,
            message_count: self.db.count_messages()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::chat::GenerationParams;
    use crate::vector::{MemoryVectorIndex, VectorIndex};
    use async_trait::async_trait;

    struct HealthyChat;

    #[async_trait]
    impl ChatProvider for HealthyChat {
        async fn generate(&self, _: &str, _: &GenerationParams) -> Result<String> {
            Ok(String::new())
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "healthy"
        }
    }

    fn service() -> SystemMonitorService {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = Arc::new(VectorStore::new(
            Arc::new(MemoryVectorIndex::new()) as Arc<dyn VectorIndex>
        ));
        SystemMonitorService::new(db, store, Arc::new(HealthyChat))
    }

    #[tokio::test]
    async fn all_components_healthy_rolls_up_healthy() {
        let monitor = service();
        let health = monitor.health().await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.record_store_status, "healthy");
        assert_eq!(health.vector_index_status, "healthy");
        assert!(health.error_details.is_empty());
    }

    #[tokio::test]
    async fn usage_window_is_clamped() {
        let monitor = service();
        monitor
            .db
            .insert_metric("/api/v1/chat", "POST", 200, 120, Some("u1"), None)
            .unwrap();
        monitor
            .db
            .insert_metric("/api/v1/chat", "POST", 503, 40, Some("u1"), Some("upstream"))
            .unwrap();

        let usage = monitor.api_usage(10_000).unwrap();
        assert_eq!(usage.window_hours, MAX_USAGE_WINDOW_HOURS);
        assert_eq!(usage.total_requests, 2);
        assert_eq!(usage.error_count, 1);
        assert_eq!(usage.error_rate, 50.0);
        assert_eq!(usage.by_endpoint.len(), 1);
    }

    #[tokio::test]
    async fn error_logs_filter_by_status_floor() {
        let monitor = service();
        monitor
            .db
            .insert_metric("/api/v1/chat", "POST", 200, 10, None, None)
            .unwrap();
        monitor
            .db
            .insert_metric("/api/v1/chat", "POST", 500, 10, None, Some("boom"))
            .unwrap();
        monitor
            .db
            .insert_metric("/api/v1/auth/login", "POST", 401, 5, None, None)
            .unwrap();

        let (rows, total) = monitor.error_logs(500, None, None, 1, 50).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0]["status"], 500);
    }
}

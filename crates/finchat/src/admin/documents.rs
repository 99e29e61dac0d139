//! Admin document oversight

use chrono::{Days, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::admin::activity::{ActivityLogger, AdminActor};
use crate::error::{Error, Result};
use crate::storage::{delete_document_on, Database};
use crate::types::activity::ActivityResult;
use crate::types::admin::{
    clamp_pagination, AdminDocumentInfo, DayCount, DocumentStatistics, Page, TypeCount,
};
use crate::vector::VectorStore;

/// Days covered by the upload trend
const TREND_DAYS: u64 = 30;

/// Document listing, deletion, and statistics for the admin surface
pub struct AdminDocumentService {
    db: Arc<Database>,
    vector_store: Arc<VectorStore>,
    activity: Arc<ActivityLogger>,
}

impl AdminDocumentService {
    pub fn new(
        db: Arc<Database>,
        vector_store: Arc<VectorStore>,
        activity: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            db,
            vector_store,
            activity,
        }
    }

    /// Paginated listing with uploader attribution
    pub fn list(
        &self,
        page: i64,
        page_size: i64,
        search: Option<&str>,
    ) -> Result<Page<AdminDocumentInfo>> {
        let (page, page_size) = clamp_pagination(page, page_size);
        let (docs, total) = self.db.list_documents_paged(page, page_size, search)?;

        let items = docs
            .into_iter()
            .map(|doc| AdminDocumentInfo {
                document_id: doc.id,
                filename: doc.filename,
                // Pre-attribution records surface the sentinel
                uploader_username: if doc.uploader_username.is_empty() {
                    "unknown".to_string()
                } else {
                    doc.uploader_username
                },
                upload_date: doc.upload_date,
                file_type: doc.file_type,
                chunk_count: doc.chunk_count,
                file_size_bytes: doc.file_size_bytes,
            })
            .collect();

        Ok(Page::new(items, total, page, page_size))
    }

    /// Delete a document on behalf of an admin: index chunks first, then the
    /// record and its audit entry in one transaction
    pub async fn delete(&self, document_id: &str, actor: &AdminActor) -> Result<usize> {
        let doc = self
            .db
            .get_document(document_id)?
            .ok_or_else(|| Error::NotFound(format!("Document not found: {document_id}")))?;

        let chunks_deleted = self.vector_store.delete_by_document(document_id).await?;

        self.db.transaction(|conn| {
            delete_document_on(conn, document_id)?;
            self.activity.log_on(
                conn,
                actor,
                "document_deleted",
                "document",
                document_id,
                serde_json::json!({
                    "filename": doc.filename,
                    "uploader": doc.uploader_username,
                    "chunks_deleted": chunks_deleted,
                }),
                ActivityResult::Success,
            )?;
            Ok(())
        })?;

        Ok(chunks_deleted)
    }

    /// Aggregate statistics over all documents
    pub async fn statistics(&self) -> Result<DocumentStatistics> {
        let docs = self.db.list_documents()?;
        let index_stats = self.vector_store.stats().await?;

        let total_documents = docs.len() as i64;
        let total_chunks = index_stats.total_chunks as i64;
        let total_size_bytes: i64 = docs.iter().map(|d| d.file_size_bytes).sum();

        let mut type_counts: HashMap<String, i64> = HashMap::new();
        for doc in &docs {
            *type_counts.entry(doc.file_type.clone()).or_insert(0) += 1;
        }
        let mut documents_by_type: Vec<TypeCount> = type_counts
            .into_iter()
            .map(|(file_type, count)| TypeCount {
                file_type,
                count,
                percentage: if total_documents > 0 {
                    (count as f64 / total_documents as f64 * 10_000.0).round() / 100.0
                } else {
                    0.0
                },
            })
            .collect();
        documents_by_type.sort_by(|a, b| b.count.cmp(&a.count));

        let today = Utc::now().date_naive();
        let mut trend: Vec<DayCount> = (0..TREND_DAYS)
            .rev()
            .map(|back| DayCount {
                date: (today - Days::new(back)).to_string(),
                count: 0,
            })
            .collect();
        for doc in &docs {
            let day = doc.upload_date.date_naive().to_string();
            if let Some(bucket) = trend.iter_mut().find(|b| b.date == day) {
                bucket.count += 1;
            }
        }

        Ok(DocumentStatistics {
            total_documents,
            total_chunks,
            total_size_mb: (total_size_bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0,
            avg_chunks_per_doc: if total_documents > 0 {
                (total_chunks as f64 / total_documents as f64 * 100.0).round() / 100.0
            } else {
                0.0
            },
            documents_by_type,
            upload_trend: trend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::DocumentRecord;
    use crate::vector::{MemoryVectorIndex, VectorIndex};
    use crate::types::document::{ChunkMetadata, IndexedChunk};

    struct Fixture {
        service: AdminDocumentService,
        db: Arc<Database>,
        index: Arc<MemoryVectorIndex>,
        activity: Arc<ActivityLogger>,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let activity = Arc::new(ActivityLogger::new(Arc::clone(&db)));
        let index = Arc::new(MemoryVectorIndex::new());
        let store = Arc::new(VectorStore::new(
            Arc::clone(&index) as Arc<dyn VectorIndex>
        ));
        Fixture {
            service: AdminDocumentService::new(
                Arc::clone(&db),
                store,
                Arc::clone(&activity),
            ),
            db,
            index,
            activity,
        }
    }

    fn actor() -> AdminActor {
        AdminActor {
            id: "admin-1".to_string(),
            username: "root".to_string(),
            client_addr: None,
        }
    }

    async fn seed_document(f: &Fixture, id: &str, chunks: usize) {
        f.db.insert_document(&DocumentRecord {
            id: id.to_string(),
            filename: format!("{id}.txt"),
            uploader_user_id: "u1".to_string(),
            uploader_username: "alice".to_string(),
            upload_date: Utc::now(),
            file_type: "txt".to_string(),
            chunk_count: chunks as i64,
            file_size_bytes: 1000,
        })
        .unwrap();

        let indexed: Vec<IndexedChunk> = (0..chunks)
            .map(|i| IndexedChunk {
                chunk_id: format!("{id}_chunk_{i}"),
                text: format!("text {i}"),
                embedding: vec![1.0, i as f32],
                metadata: ChunkMetadata {
                    document_id: id.to_string(),
                    chunk_index: i,
                    filename: format!("{id}.txt"),
                    upload_date: Utc::now(),
                    file_type: "txt".to_string(),
                    file_size_bytes: 1000,
                    uploader_user_id: Some("u1".to_string()),
                    uploader_username: Some("alice".to_string()),
                },
            })
            .collect();
        f.index.upsert(indexed).await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_chunks_record_and_audits() {
        let f = fixture();
        seed_document(&f, "doc_1", 3).await;

        let removed = f.service.delete("doc_1", &actor()).await.unwrap();
        assert_eq!(removed, 3);
        assert!(f.db.get_document("doc_1").unwrap().is_none());
        assert_eq!(f.index.count().await.unwrap(), 0);

        let (entries, total) = f
            .activity
            .list(None, Some("document_deleted"), Some("doc_1"), None, None, 1, 50)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].details["chunks_deleted"], 3);
    }

    #[tokio::test]
    async fn delete_of_missing_document_is_not_found() {
        let f = fixture();
        let err = f.service.delete("ghost", &actor()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn statistics_aggregate_types_and_sizes() {
        let f = fixture();
        seed_document(&f, "doc_1", 2).await;
        seed_document(&f, "doc_2", 4).await;

        let stats = f.service.statistics().await.unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_chunks, 6);
        assert_eq!(stats.avg_chunks_per_doc, 3.0);
        assert_eq!(stats.documents_by_type[0].file_type, "txt");
        assert_eq!(stats.documents_by_type[0].percentage, 100.0);
        // Today's bucket carries both uploads
        assert_eq!(stats.upload_trend.last().unwrap().count, 2);
    }
}

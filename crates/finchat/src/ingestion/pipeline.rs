//! End-to-end document ingestion

use chrono::Utc;
use std::sync::Arc;

use crate::admin::config::ConfigManager;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::storage::Database;
use crate::types::document::{
    ChunkMetadata, DocumentRecord, DocumentUploadResponse, FileType, IndexedChunk,
};
use crate::types::user::User;
use crate::vector::VectorStore;

use super::chunker::RecursiveCharacterSplitter;
use super::extract::extract_text;

/// Orchestrates extract -> chunk -> embed -> index -> record.
///
/// Ingestion is all-or-nothing from the caller's viewpoint: a failure after
/// the index write rolls the chunks back before returning.
pub struct IngestionPipeline {
    db: Arc<Database>,
    vector_store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: Arc<ConfigManager>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<Database>,
        vector_store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            db,
            vector_store,
            embedder,
            config,
        }
    }

    /// Ingest one uploaded file on behalf of a user
    pub async fn ingest(
        &self,
        uploader: &User,
        filename: &str,
        data: &[u8],
    ) -> Result<DocumentUploadResponse> {
        let settings = self.config.snapshot();

        let file_type = FileType::from_filename(filename)?;

        let max_bytes = settings.max_file_size_bytes();
        if data.len() > max_bytes {
            return Err(Error::PayloadTooLarge(format!(
                "File size {} bytes exceeds maximum limit of {}MB",
                data.len(),
                settings.max_file_size_mb
            )));
        }
        if data.is_empty() {
            return Err(Error::validation("Uploaded file is empty"));
        }

        tracing::info!(
            filename,
            file_type = file_type.as_str(),
            bytes = data.len(),
            uploader = %uploader.username,
            "processing document"
        );

        let text = extract_text(filename, file_type, data)?;

        let splitter = RecursiveCharacterSplitter::new(settings.chunk_size, settings.chunk_overlap);
        let chunks = splitter.split(&text);
        if chunks.is_empty() {
            return Err(Error::extraction(filename, "No chunks created from text"));
        }

        let document_id = new_document_id();
        let upload_date = Utc::now();

        let embeddings = self
            .embedder
            .embed_documents(&settings.embedding_model, &chunks)
            .await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "Embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let indexed: Vec<IndexedChunk> = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| IndexedChunk {
                chunk_id: format!("{document_id}_chunk_{index}"),
                text: text.clone(),
                embedding,
                metadata: ChunkMetadata {
                    document_id: document_id.clone(),
                    chunk_index: index,
                    filename: filename.to_string(),
                    upload_date,
                    file_type: file_type.as_str().to_string(),
                    file_size_bytes: data.len() as i64,
                    uploader_user_id: Some(uploader.id.clone()),
                    uploader_username: Some(uploader.username.clone()),
                },
            })
            .collect();
        let chunk_count = indexed.len() as i64;

        // One logical write; roll back on any later failure
        self.vector_store.upsert(indexed).await?;

        let record = DocumentRecord {
            id: document_id.clone(),
            filename: filename.to_string(),
            uploader_user_id: uploader.id.clone(),
            uploader_username: uploader.username.clone(),
            upload_date,
            file_type: file_type.as_str().to_string(),
            chunk_count,
            file_size_bytes: data.len() as i64,
        };
        if let Err(e) = self.db.insert_document(&record) {
            tracing::error!("Document record write failed, rolling back index: {e}");
            if let Err(rollback_err) = self.vector_store.delete_by_document(&document_id).await {
                tracing::error!("Rollback of document {document_id} failed: {rollback_err}");
            }
            return Err(e);
        }

        tracing::info!(
            document_id,
            chunks = chunk_count,
            "document ingested"
        );

        Ok(DocumentUploadResponse {
            document_id,
            filename: filename.to_string(),
            chunks_created: chunk_count,
            upload_date,
        })
    }

    /// Delete a document: chunks first, then the record
    pub async fn delete_document(&self, document_id: &str) -> Result<usize> {
        if self.db.get_document(document_id)?.is_none() {
            return Err(Error::NotFound(format!(
                "Document not found: {document_id}"
            )));
        }
        let removed = self.vector_store.delete_by_document(document_id).await?;
        self.db.delete_document(document_id)?;
        tracing::info!(document_id, chunks_deleted = removed, "document deleted");
        Ok(removed)
    }
}

/// Document ids carry a time-derived suffix plus entropy against same-instant
/// uploads
fn new_document_id() -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string();
    format!("doc_{}_{}", Utc::now().timestamp_millis(), &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::activity::ActivityLogger;
    use crate::config::Settings;
    use crate::providers::embedding::EmbeddingProvider;
    use crate::vector::{MemoryVectorIndex, VectorStore};
    use async_trait::async_trait;

    /// Deterministic embedder: vector derived from text bytes
    struct FakeEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed_query(&self, _model: &str, text: &str) -> crate::error::Result<Vec<f32>> {
            self.embed_document(_model, text).await
        }

        async fn embed_document(&self, _model: &str, text: &str) -> crate::error::Result<Vec<f32>> {
            if self.fail {
                return Err(Error::Embedding("provider down".to_string()));
            }
            let sum: u32 = text.bytes().map(u32::from).sum();
            Ok(vec![(sum % 97) as f32 + 1.0, text.len() as f32])
        }

        async fn health_check(&self) -> crate::error::Result<bool> {
            Ok(!self.fail)
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn pipeline(fail_embeddings: bool) -> (IngestionPipeline, Arc<Database>, Arc<VectorStore>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let activity = Arc::new(ActivityLogger::new(Arc::clone(&db)));
        let config =
            Arc::new(ConfigManager::new(Arc::clone(&db), activity, &Settings::default()).unwrap());
        let store = Arc::new(VectorStore::new(Arc::new(MemoryVectorIndex::new())));
        let pipeline = IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&store),
            Arc::new(FakeEmbedder {
                fail: fail_embeddings,
            }),
            config,
        );
        (pipeline, db, store)
    }

    fn uploader() -> User {
        let now = Utc::now();
        User {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            full_name: None,
            is_active: true,
            is_admin: false,
            must_reset: false,
            reset_token: None,
            reset_token_issued_at: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[tokio::test]
    async fn small_txt_yields_one_chunk_and_matching_record() {
        let (pipeline, db, store) = pipeline(false);
        let body = b"Q4 revenue was $2.5M, up 15% from Q3's $2.17M.";

        let response = pipeline.ingest(&uploader(), "q4.txt", body).await.unwrap();
        assert_eq!(response.chunks_created, 1);
        assert!(response.document_id.starts_with("doc_"));

        // Record-store count matches the index count for the document
        let record = db.get_document(&response.document_id).unwrap().unwrap();
        assert_eq!(record.chunk_count, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(record.uploader_username, "alice");
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let (pipeline, _, store) = pipeline(false);
        let err = pipeline
            .ingest(&uploader(), "sheet.xlsx", b"data")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn oversized_file_is_payload_too_large() {
        let (pipeline, _, _) = pipeline(false);
        let body = vec![b'a'; 10_000_001]; // limit is 10 MB decimal
        let err = pipeline.ingest(&uploader(), "big.txt", &body).await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn file_at_exact_limit_is_accepted() {
        let (pipeline, _, _) = pipeline(false);
        let body = vec![b'a'; 10_000_000];
        assert!(pipeline.ingest(&uploader(), "max.txt", &body).await.is_ok());
    }

    #[tokio::test]
    async fn embedding_failure_leaves_no_partial_state() {
        let (pipeline, db, store) = pipeline(true);
        let err = pipeline
            .ingest(&uploader(), "doc.txt", b"some financial text")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(db.list_documents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reupload_creates_independent_document() {
        let (pipeline, db, store) = pipeline(false);
        let body = b"identical bytes";

        let first = pipeline.ingest(&uploader(), "a.txt", body).await.unwrap();
        let second = pipeline.ingest(&uploader(), "a.txt", body).await.unwrap();
        assert_ne!(first.document_id, second.document_id);
        assert_eq!(store.count().await.unwrap(), 2);

        // Deleting one does not affect the other
        pipeline.delete_document(&first.document_id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(db.get_document(&second.document_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_returns_chunk_count_and_restores_stats() {
        let (pipeline, db, store) = pipeline(false);
        let body = "paragraph one text here.\n\n".repeat(80);

        let response = pipeline
            .ingest(&uploader(), "long.txt", body.as_bytes())
            .await
            .unwrap();
        assert!(response.chunks_created > 1);

        let removed = pipeline.delete_document(&response.document_id).await.unwrap();
        assert_eq!(removed as i64, response.chunks_created);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(db.list_documents().unwrap().is_empty());
    }
}

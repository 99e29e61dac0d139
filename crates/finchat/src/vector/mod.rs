//! Vector index abstraction

mod memory;

pub use memory::MemoryVectorIndex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::types::document::{ChunkMetadata, IndexedChunk};

/// How long an is-empty answer may be served from cache
const EMPTY_HINT_TTL: Duration = Duration::from_secs(30);

/// A search hit: chunk payload plus its similarity score
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity in [0, 1]
    pub score: f32,
}

/// Aggregate index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub total_documents: usize,
    pub chunks_by_type: HashMap<String, usize>,
    /// Uploads per calendar day over the last seven days
    pub recent_uploads: Vec<(String, usize)>,
}

/// Storage and k-NN search over chunk embeddings
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add a chunk batch as one logical write
    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<()>;

    /// Cosine top-k with a score floor.
    ///
    /// Results are ordered by descending score, ties broken by chunk id;
    /// `top_k` is an upper bound, not a required count. Only hits with
    /// `score >= min_score` are returned.
    async fn search(&self, query: &[f32], top_k: usize, min_score: f32) -> Result<Vec<SearchHit>>;

    /// Remove every chunk of a document, returning how many were removed
    async fn delete_by_document(&self, document_id: &str) -> Result<usize>;

    /// Total stored chunks
    async fn count(&self) -> Result<usize>;

    /// Aggregate statistics for the admin surface
    async fn stats(&self) -> Result<IndexStats>;

    async fn health_check(&self) -> Result<bool>;

    /// Index name for logging
    fn name(&self) -> &str;
}

/// Engine-facing wrapper that adds the cached is-empty hint.
///
/// The hint is served for up to 30 seconds and invalidated by any write, so a
/// transient false "empty" right after the first upload is possible and
/// callers must treat the answer as a hint.
pub struct VectorStore {
    index: Arc<dyn VectorIndex>,
    empty_hint: RwLock<Option<(bool, Instant)>>,
}

impl VectorStore {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            empty_hint: RwLock::new(None),
        }
    }

    /// Whether the index currently holds no chunks.
    ///
    /// A failure to reach the index reads as "not empty" so that retrieval
    /// still runs and degrades through its own fallback.
    pub async fn is_empty(&self) -> bool {
        if let Some((cached, at)) = *self.empty_hint.read() {
            if at.elapsed() < EMPTY_HINT_TTL {
                return cached;
            }
        }

        match self.index.count().await {
            Ok(count) => {
                let is_empty = count == 0;
                *self.empty_hint.write() = Some((is_empty, Instant::now()));
                is_empty
            }
            Err(e) => {
                tracing::warn!("Failed to check vector index emptiness: {e}");
                false
            }
        }
    }

    fn invalidate_empty_hint(&self) {
        *self.empty_hint.write() = None;
    }

    pub async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<()> {
        let result = self.index.upsert(chunks).await;
        self.invalidate_empty_hint();
        result
    }

    /// Search; failures surface as an empty list so the engine degrades to
    /// the no-context path instead of erroring.
    pub async fn search(&self, query: &[f32], top_k: usize, min_score: f32) -> Vec<SearchHit> {
        match self.index.search(query, top_k, min_score).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Vector search failed, degrading to no-context: {e}");
                Vec::new()
            }
        }
    }

    pub async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let result = self.index.delete_by_document(document_id).await;
        self.invalidate_empty_hint();
        result
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.stats().await
    }

    pub async fn count(&self) -> Result<usize> {
        self.index.count().await
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.index.health_check().await
    }
}

/// Bucket upload timestamps into per-day counts for the last seven days
pub(crate) fn recent_upload_histogram(dates: impl Iterator<Item = DateTime<Utc>>) -> Vec<(String, usize)> {
    let today = Utc::now().date_naive();
    let mut buckets: Vec<(String, usize)> = (0..7u64)
        .rev()
        .map(|back| ((today - chrono::Days::new(back)).to_string(), 0))
        .collect();

    for date in dates {
        let day = date.date_naive().to_string();
        if let Some(bucket) = buckets.iter_mut().find(|(d, _)| *d == day) {
            bucket.1 += 1;
        }
    }
    buckets
}

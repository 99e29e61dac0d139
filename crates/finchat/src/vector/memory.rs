//! In-process vector index with brute-force cosine search

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::types::document::IndexedChunk;

use super::{recent_upload_histogram, IndexStats, SearchHit, VectorIndex};

/// In-memory chunk index.
///
/// Brute-force cosine over a concurrent map; adequate for corpus sizes this
/// service targets and trivially swappable for a remote engine behind the
/// same trait.
#[derive(Default)]
pub struct MemoryVectorIndex {
    chunks: DashMap<String, IndexedChunk>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<()> {
        for chunk in &chunks {
            if chunk.text.is_empty() {
                return Err(Error::VectorIndex(format!(
                    "Refusing to index empty chunk {}",
                    chunk.chunk_id
                )));
            }
        }
        for chunk in chunks {
            self.chunks.insert(chunk.chunk_id.clone(), chunk);
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize, min_score: f32) -> Result<Vec<SearchHit>> {
        if query.is_empty() {
            return Err(Error::VectorIndex("Empty query embedding".to_string()));
        }

        let mut hits: Vec<SearchHit> = self
            .chunks
            .iter()
            .filter_map(|entry| {
                let chunk = entry.value();
                let score = cosine_similarity(query, &chunk.embedding)?.max(0.0);
                if score >= min_score {
                    Some(SearchHit {
                        chunk_id: chunk.chunk_id.clone(),
                        text: chunk.text.clone(),
                        metadata: chunk.metadata.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        // Descending score; equal scores fall back to chunk id order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let victims: Vec<String> = self
            .chunks
            .iter()
            .filter(|entry| entry.value().metadata.document_id == document_id)
            .map(|entry| entry.key().clone())
            .collect();

        for chunk_id in &victims {
            self.chunks.remove(chunk_id);
        }
        Ok(victims.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.chunks.len())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let mut documents = HashSet::new();
        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut doc_dates = HashMap::new();

        for entry in self.chunks.iter() {
            let meta = &entry.value().metadata;
            if documents.insert(meta.document_id.clone()) {
                *by_type.entry(meta.file_type.clone()).or_insert(0) += 1;
                doc_dates.insert(meta.document_id.clone(), meta.upload_date);
            }
        }

        Ok(IndexStats {
            total_chunks: self.chunks.len(),
            total_documents: documents.len(),
            chunks_by_type: by_type,
            recent_uploads: recent_upload_histogram(doc_dates.into_values()),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Cosine similarity of two vectors; None when dimensions differ or either
/// vector has zero magnitude
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::ChunkMetadata;
    use chrono::Utc;

    fn chunk(doc: &str, index: usize, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk_id: format!("{doc}_chunk_{index}"),
            text: format!("chunk text {index}"),
            embedding,
            metadata: ChunkMetadata {
                document_id: doc.to_string(),
                chunk_index: index,
                filename: format!("{doc}.txt"),
                upload_date: Utc::now(),
                file_type: "txt".to_string(),
                file_size_bytes: 100,
                uploader_user_id: Some("u1".to_string()),
                uploader_username: Some("alice".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn search_orders_by_score_and_respects_threshold() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                chunk("doc_1", 0, vec![1.0, 0.0]),
                chunk("doc_1", 1, vec![0.9, 0.1]),
                chunk("doc_2", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 10, 0.5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "doc_1_chunk_0");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| h.score >= 0.5));
    }

    #[tokio::test]
    async fn top_k_is_an_upper_bound() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![chunk("doc_1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 5, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn equal_scores_tie_break_on_chunk_id() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                chunk("doc_b", 0, vec![1.0, 0.0]),
                chunk("doc_a", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 10, 0.0).await.unwrap();
        assert_eq!(hits[0].chunk_id, "doc_a_chunk_0");
        assert_eq!(hits[1].chunk_id, "doc_b_chunk_0");
    }

    #[tokio::test]
    async fn delete_by_document_removes_only_that_document() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                chunk("doc_1", 0, vec![1.0, 0.0]),
                chunk("doc_1", 1, vec![1.0, 0.1]),
                chunk("doc_2", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let removed = index.delete_by_document("doc_1").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_empty_chunk_text() {
        let index = MemoryVectorIndex::new();
        let mut bad = chunk("doc_1", 0, vec![1.0]);
        bad.text = String::new();
        assert!(index.upsert(vec![bad]).await.is_err());
    }

    #[tokio::test]
    async fn stats_counts_unique_documents() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                chunk("doc_1", 0, vec![1.0, 0.0]),
                chunk("doc_1", 1, vec![0.9, 0.1]),
                chunk("doc_2", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.chunks_by_type.get("txt"), Some(&2));
    }
}

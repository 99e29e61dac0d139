//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into fixed-dimension vectors.
///
/// The model name is passed per call because it is live-reloadable through
/// the admin config surface.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, model: &str, text: &str) -> Result<Vec<f32>>;

    /// Embed document chunks, batching where the provider allows.
    ///
    /// The default implementation embeds sequentially; implementations with a
    /// batch endpoint should override it. Either way the result preserves
    /// input order and length.
    async fn embed_documents(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_document(model, text).await?);
        }
        Ok(embeddings)
    }

    /// Embed a single document chunk
    async fn embed_document(&self, model: &str, text: &str) -> Result<Vec<f32>>;

    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

//! Chat completion provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Per-call generation parameters, snapshotted from the live config
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i64,
}

/// Completes a prompt into a bounded answer string.
///
/// Failures are classified as retryable (network, 5xx, rate limit) or fatal
/// (invalid request, authentication) via `Error::ChatCompletion.retryable`;
/// the RAG engine's retry loop only retries the former.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

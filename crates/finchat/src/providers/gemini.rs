//! Gemini REST API clients for embeddings and chat completion

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use crate::error::{Error, Result};

use super::chat::{ChatProvider, GenerationParams};
use super::embedding::EmbeddingProvider;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Batch embedding requests are capped by the provider
const EMBED_BATCH_LIMIT: usize = 100;

/// Request timeout for a single provider call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::internal(format!("Failed to build HTTP client: {e}")))
}

/// Strip the `models/` prefix the config convention carries
fn model_path(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

// ==================== Embeddings ====================

/// Gemini embedding client (`embedContent` / `batchEmbedContents`)
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
}

#[derive(serde::Serialize)]
struct EmbedRequest {
    content: Content,
    #[serde(rename = "taskType")]
    task_type: &'static str,
}

#[derive(serde::Serialize)]
struct BatchEmbedRequest {
    requests: Vec<BatchEmbedEntry>,
}

#[derive(serde::Serialize)]
struct BatchEmbedEntry {
    model: String,
    content: Content,
    #[serde(rename = "taskType")]
    task_type: &'static str,
}

#[derive(serde::Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
struct Part {
    text: String,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(serde::Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(serde::Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key,
        })
    }

    async fn embed_one(&self, model: &str, text: &str, task_type: &'static str) -> Result<Vec<f32>> {
        let url = format!(
            "{API_BASE}/models/{}:embedContent?key={}",
            model_path(model),
            self.api_key
        );

        let request = EmbedRequest {
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Embedding request failed ({status}): {body}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {e}")))?;
        Ok(parsed.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed_query(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        self.embed_one(model, text, "RETRIEVAL_QUERY").await
    }

    async fn embed_document(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        self.embed_one(model, text, "RETRIEVAL_DOCUMENT").await
    }

    async fn embed_documents(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        let model_name = format!("models/{}", model_path(model));

        for batch in texts.chunks(EMBED_BATCH_LIMIT) {
            let url = format!(
                "{API_BASE}/models/{}:batchEmbedContents?key={}",
                model_path(model),
                self.api_key
            );

            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| BatchEmbedEntry {
                        model: model_name.clone(),
                        content: Content {
                            parts: vec![Part { text: text.clone() }],
                        },
                        task_type: "RETRIEVAL_DOCUMENT",
                    })
                    .collect(),
            };

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::Embedding(format!("Batch embedding request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Embedding(format!(
                    "Batch embedding failed ({status}): {body}"
                )));
            }

            let parsed: BatchEmbedResponse = response.json().await.map_err(|e| {
                Error::Embedding(format!("Failed to parse batch embedding response: {e}"))
            })?;

            if parsed.embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "Batch embedding count mismatch: sent {}, got {}",
                    batch.len(),
                    parsed.embeddings.len()
                )));
            }

            embeddings.extend(parsed.embeddings.into_iter().map(|e| e.values));
        }

        Ok(embeddings)
    }

    async fn health_check(&self) -> Result<bool> {
        // A models listing round-trip verifies reachability and key validity
        let url = format!("{API_BASE}/models?key={}&pageSize=1", self.api_key);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ==================== Chat completion ====================

/// Gemini chat client (`generateContent`)
pub struct GeminiChat {
    client: reqwest::Client,
    api_key: String,
}

#[derive(serde::Serialize)]
struct GenerateRequest {
    contents: Vec<GenContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct GenContent {
    role: String,
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i64,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(serde::Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    text: String,
}

impl GeminiChat {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key,
        })
    }

    /// Map an HTTP status to the retry classification the engine uses
    fn classify_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }
}

#[async_trait]
impl ChatProvider for GeminiChat {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!(
            "{API_BASE}/models/{}:generateContent?key={}",
            model_path(&params.model),
            self.api_key
        );

        let request = GenerateRequest {
            contents: vec![GenContent {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            // Network-level failures are transient by classification
            .map_err(|e| Error::chat_transient(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = format!("Gemini generation failed ({status}): {body}");
            return Err(if Self::classify_status(status) {
                Error::chat_transient(message)
            } else {
                Error::chat(message)
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::chat(format!("Failed to parse Gemini response: {e}")))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| Error::chat("No text in Gemini response"))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{API_BASE}/models?key={}&pageSize=1", self.api_key);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        assert!(GeminiChat::classify_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(GeminiChat::classify_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(GeminiChat::classify_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!GeminiChat::classify_status(StatusCode::BAD_REQUEST));
        assert!(!GeminiChat::classify_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn model_path_strips_prefix() {
        assert_eq!(model_path("models/gemini-2.5-flash"), "gemini-2.5-flash");
        assert_eq!(model_path("gemini-2.5-flash"), "gemini-2.5-flash");
    }
}

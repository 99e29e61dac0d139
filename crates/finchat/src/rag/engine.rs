//! RAG query engine: retrieval, prompt assembly, generation, persistence

use std::sync::Arc;
use std::time::Duration;

use crate::admin::config::ConfigManager;
use crate::error::Result;
use crate::providers::chat::{ChatProvider, GenerationParams};
use crate::providers::embedding::EmbeddingProvider;
use crate::sessions::SessionStore;
use crate::types::chat::{ChatResponse, Source};
use crate::types::user::User;
use crate::vector::{SearchHit, VectorStore};

use super::prompt::{PromptBuilder, REFUSAL_MESSAGE};

/// Maximum generation retries after the first attempt
const MAX_RETRIES: u32 = 2;

/// Backoff before each retry
const RETRY_BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

/// Source chunk text is truncated to this many characters for transport
const SOURCE_PREVIEW_CHARS: usize = 200;

/// Orchestrates the query pipeline.
///
/// Retrieval degradation is deliberate: an empty index, a failed query
/// embedding, or zero hits above the threshold all route through the single
/// no-context fallback call instead of surfacing an error.
pub struct RagEngine {
    vector_store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    sessions: Arc<SessionStore>,
    config: Arc<ConfigManager>,
}

impl RagEngine {
    pub fn new(
        vector_store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        sessions: Arc<SessionStore>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            chat,
            sessions,
            config,
        }
    }

    /// Process a query for an authenticated user
    pub async fn query(
        &self,
        user: &User,
        query: &str,
        session_id: Option<String>,
    ) -> Result<ChatResponse> {
        let settings = self.config.snapshot();

        let session_id = match session_id {
            Some(id) => self.sessions.ensure_owned(&id, &user.id)?.id,
            None => self.sessions.create(&user.id)?,
        };
        tracing::info!(session_id, user = %user.username, "processing query");

        let history = self
            .sessions
            .history(&session_id, settings.max_conversation_turns * 2)?;

        let params = GenerationParams {
            model: settings.chat_model.clone(),
            temperature: settings.gemini_temperature,
            max_tokens: settings.gemini_max_tokens,
        };

        // Fast path: an empty index skips embedding entirely
        if self.vector_store.is_empty().await {
            tracing::info!("vector index is empty, skipping retrieval");
            return self.handle_no_context(&session_id, query, &params).await;
        }

        let query_embedding = match self
            .embedder
            .embed_query(&settings.embedding_model, query)
            .await
        {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("query embedding failed, degrading to no-context: {e}");
                return self.handle_no_context(&session_id, query, &params).await;
            }
        };

        let hits = self
            .vector_store
            .search(&query_embedding, settings.top_k, settings.similarity_threshold)
            .await;
        if hits.is_empty() {
            tracing::info!("no chunks above similarity threshold");
            return self.handle_no_context(&session_id, query, &params).await;
        }

        let prompt = PromptBuilder::build(query, &hits, &history);
        let answer = self.generate_with_retry(&prompt, &params).await?;

        self.sessions.append_pair(&session_id, query, &answer)?;

        let sources = project_sources(&hits);
        tracing::info!(
            session_id,
            sources = sources.len(),
            "query answered from retrieved context"
        );

        Ok(ChatResponse {
            response: answer,
            sources,
            session_id,
        })
    }

    /// One combined classification-and-answer call for queries with no
    /// usable retrieval. The exchange persists like a normal Q/A pair and
    /// carries no sources.
    async fn handle_no_context(
        &self,
        session_id: &str,
        query: &str,
        params: &GenerationParams,
    ) -> Result<ChatResponse> {
        let prompt = PromptBuilder::build_no_context(query);

        let answer = match self.chat.generate(&prompt, params).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!("no-context generation failed, using canned refusal: {e}");
                REFUSAL_MESSAGE.to_string()
            }
        };

        self.sessions.append_pair(session_id, query, &answer)?;

        Ok(ChatResponse {
            response: answer,
            sources: Vec::new(),
            session_id: session_id.to_string(),
        })
    }

    /// Generation with bounded retry: transient provider errors back off 1s
    /// then 2s; fatal errors fail immediately.
    async fn generate_with_retry(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let mut last_err = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF[(attempt - 1) as usize]).await;
            }
            tracing::debug!(attempt = attempt + 1, "generating response");
            match self.chat.generate(prompt, params).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    tracing::warn!("generation attempt {} failed: {e}", attempt + 1);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.expect("retry loop exited without error"))
    }
}

/// Project hits into response sources: one entry per document, in hit order,
/// preview capped at 200 characters, score unrounded
fn project_sources(hits: &[SearchHit]) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.metadata.document_id.clone()))
        .map(|hit| Source {
            document_id: hit.metadata.document_id.clone(),
            filename: hit.metadata.filename.clone(),
            chunk_text: truncate_chars(&hit.text, SOURCE_PREVIEW_CHARS),
            relevance_score: hit.score,
        })
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::activity::ActivityLogger;
    use crate::config::Settings;
    use crate::error::Error;
    use crate::storage::Database;
    use crate::types::document::{ChunkMetadata, IndexedChunk};
    use crate::vector::{MemoryVectorIndex, VectorIndex};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed_query(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(Error::Embedding("embedder down".to_string()));
            }
            Ok(vec![1.0, 0.0])
        }

        async fn embed_document(&self, model: &str, text: &str) -> Result<Vec<f32>> {
            self.embed_query(model, text).await
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    /// Scripted chat provider: pops one result per call
    struct FakeChat {
        script: Mutex<Vec<Result<String>>>,
        calls: AtomicUsize,
    }

    impl FakeChat {
        fn new(script: Vec<Result<String>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn answering(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }
    }

    #[async_trait]
    impl ChatProvider for FakeChat {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop()
                .unwrap_or_else(|| Ok("default answer".to_string()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct Fixture {
        engine: RagEngine,
        sessions: Arc<SessionStore>,
        index: Arc<MemoryVectorIndex>,
        chat: Arc<FakeChat>,
        user: User,
    }

    fn fixture(chat: FakeChat, embedder_fails: bool) -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let activity = Arc::new(ActivityLogger::new(Arc::clone(&db)));
        let config =
            Arc::new(ConfigManager::new(Arc::clone(&db), activity, &Settings::default()).unwrap());
        let index = Arc::new(MemoryVectorIndex::new());
        let store = Arc::new(VectorStore::new(
            Arc::clone(&index) as Arc<dyn VectorIndex>
        ));
        let sessions = Arc::new(SessionStore::new(Arc::clone(&db)));
        let chat = Arc::new(chat);

        let engine = RagEngine::new(
            store,
            Arc::new(FakeEmbedder {
                fail: embedder_fails,
            }),
            Arc::clone(&chat) as Arc<dyn ChatProvider>,
            Arc::clone(&sessions),
            config,
        );

        let now = Utc::now();
        let user = User {
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
        };

        Fixture {
            engine,
            sessions,
            index,
            chat,
            user,
        }
    }

    fn chunk(doc: &str, index: usize, text: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk_id: format!("{doc}_chunk_{index}"),
            text: text.to_string(),
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
    async fn empty_index_takes_no_context_path_and_persists_pair() {
        let f = fixture(FakeChat::answering("Compound interest is..."), false);

        let response = f
            .engine
            .query(&f.user, "What is compound interest?", None)
            .await
            .unwrap();

        assert_eq!(response.response, "Compound interest is...");
        assert!(response.sources.is_empty());
        assert!(!response.session_id.is_empty());

        let history = f.sessions.history(&response.session_id, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "What is compound interest?");
    }

    #[tokio::test]
    async fn retrieval_answer_carries_deduplicated_sources() {
        let f = fixture(FakeChat::answering("Q4 revenue was $2.5M."), false);
        f.index
            .upsert(vec![
                chunk("doc_x", 0, "Q4 revenue was $2.5M, up 15% from Q3.", vec![1.0, 0.0]),
                chunk("doc_x", 1, "Q3 revenue was $2.17M.", vec![0.98, 0.05]),
                chunk("doc_y", 0, "Operating costs fell 3%.", vec![0.95, 0.2]),
            ])
            .await
            .unwrap();

        let response = f
            .engine
            .query(&f.user, "What was the Q4 revenue?", None)
            .await
            .unwrap();

        // Two documents above threshold, deduplicated in hit order
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].document_id, "doc_x");
        assert!(response.sources[0].relevance_score >= 0.7);
        assert!(response.sources[0].chunk_text.chars().count() <= 200);
    }

    #[tokio::test]
    async fn cross_user_session_is_an_authorization_error() {
        let f = fixture(FakeChat::answering("hi"), false);
        let other_session = f.sessions.create("someone-else").unwrap();

        let err = f
            .engine
            .query(&f.user, "What is a bond?", Some(other_session))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_no_context() {
        let f = fixture(FakeChat::answering("General answer"), true);
        f.index
            .upsert(vec![chunk("doc_x", 0, "content", vec![1.0, 0.0])])
            .await
            .unwrap();

        let response = f.engine.query(&f.user, "Anything?", None).await.unwrap();
        assert!(response.sources.is_empty());
        assert_eq!(response.response, "General answer");
    }

    #[tokio::test]
    async fn hits_below_threshold_degrade_to_no_context() {
        let f = fixture(FakeChat::answering("General answer"), false);
        // Orthogonal to the query embedding: similarity 0 < 0.7 threshold
        f.index
            .upsert(vec![chunk("doc_x", 0, "content", vec![0.0, 1.0])])
            .await
            .unwrap();

        let response = f.engine.query(&f.user, "Anything?", None).await.unwrap();
        assert!(response.sources.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let f = fixture(
            FakeChat::new(vec![
                Err(Error::chat_transient("503")),
                Err(Error::chat_transient("503 again")),
                Ok("recovered".to_string()),
            ]),
            false,
        );
        f.index
            .upsert(vec![chunk("doc_x", 0, "content", vec![1.0, 0.0])])
            .await
            .unwrap();

        let response = f.engine.query(&f.user, "Question?", None).await.unwrap();
        assert_eq!(response.response, "recovered");
        assert_eq!(f.chat.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_error() {
        let f = fixture(
            FakeChat::new(vec![
                Err(Error::chat_transient("503")),
                Err(Error::chat_transient("503")),
                Err(Error::chat_transient("503")),
            ]),
            false,
        );
        f.index
            .upsert(vec![chunk("doc_x", 0, "content", vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = f.engine.query(&f.user, "Question?", None).await.unwrap_err();
        assert!(matches!(err, Error::ChatCompletion { .. }));
        assert_eq!(f.chat.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_generation_errors_fail_immediately() {
        let f = fixture(
            FakeChat::new(vec![Err(Error::chat("invalid request"))]),
            false,
        );
        f.index
            .upsert(vec![chunk("doc_x", 0, "content", vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = f.engine.query(&f.user, "Question?", None).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(f.chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_context_generation_failure_returns_canned_refusal() {
        let f = fixture(FakeChat::new(vec![Err(Error::chat("down"))]), false);

        let response = f
            .engine
            .query(&f.user, "What's the weather today?", None)
            .await
            .unwrap();
        assert!(response.response.starts_with("I'm a financial assistant"));
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn top_k_of_one_yields_the_single_best_source() {
        let f = fixture(FakeChat::answering("answer"), false);
        f.index
            .upsert(vec![
                chunk("doc_best", 0, "closest match", vec![1.0, 0.0]),
                chunk("doc_other", 0, "weaker match", vec![0.9, 0.3]),
            ])
            .await
            .unwrap();

        f.engine
            .config
            .update(
                "top_k_chunks",
                &serde_json::json!(1),
                &crate::admin::AdminActor {
                    id: "admin".to_string(),
                    username: "root".to_string(),
                    client_addr: None,
                },
            )
            .unwrap();

        let response = f.engine.query(&f.user, "Question?", None).await.unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].document_id, "doc_best");
    }

    #[tokio::test]
    async fn threshold_of_one_falls_back_to_no_context() {
        let f = fixture(FakeChat::answering("general answer"), false);
        // Near miss: high similarity but below 1.0
        f.index
            .upsert(vec![chunk("doc_x", 0, "content", vec![0.99, 0.05])])
            .await
            .unwrap();

        f.engine
            .config
            .update(
                "similarity_threshold",
                &serde_json::json!(1.0),
                &crate::admin::AdminActor {
                    id: "admin".to_string(),
                    username: "root".to_string(),
                    client_addr: None,
                },
            )
            .unwrap();

        let response = f.engine.query(&f.user, "Question?", None).await.unwrap();
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn supplied_session_is_reused_across_queries() {
        let f = fixture(
            FakeChat::new(vec![Ok("one".to_string()), Ok("two".to_string())]),
            false,
        );

        let first = f.engine.query(&f.user, "First?", None).await.unwrap();
        let second = f
            .engine
            .query(&f.user, "Second?", Some(first.session_id.clone()))
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);

        let history = f.sessions.history(&second.session_id, 10).unwrap();
        assert_eq!(history.len(), 4);
    }
}

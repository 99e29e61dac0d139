//! Provider abstractions for embeddings and chat completion
//!
//! Trait-based so tests can substitute in-process fakes for the remote
//! Gemini services.

pub mod chat;
pub mod embedding;
pub mod gemini;

pub use chat::{ChatProvider, GenerationParams};
pub use embedding::EmbeddingProvider;
pub use gemini::{GeminiChat, GeminiEmbedder};

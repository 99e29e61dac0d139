//! Chat request/response types

use serde::{Deserialize, Serialize};

/// Request body for the chat endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's financial query (1-2000 characters)
    pub query: String,
    /// Optional session id for conversation continuity
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A source document cited in a chat response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub document_id: String,
    pub filename: String,
    /// Chunk text truncated to 200 characters for transport
    pub chunk_text: String,
    /// Relevance score in [0, 1], unrounded
    pub relevance_score: f32,
}

/// Response body for the chat endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Message role within a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

//! Startup configuration loaded from environment variables

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Application settings resolved at process start.
///
/// The subset of these that is live-reloadable is seeded into the
/// `system_config` table on startup; admin updates there take effect on the
/// next query without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// API key for the Gemini REST API
    pub google_api_key: String,
    /// Chat model name
    pub gemini_chat_model: String,
    /// Embedding model name
    pub gemini_embedding_model: String,
    /// Temperature for generation (0.0-2.0)
    pub gemini_temperature: f64,
    /// Maximum tokens for generation
    pub gemini_max_tokens: i64,
    /// Target chunk size in characters
    pub chunk_size: i64,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: i64,
    /// Maximum upload size in megabytes
    pub max_file_size_mb: i64,
    /// Number of chunks retrieved per query
    pub top_k_chunks: i64,
    /// Minimum similarity score for retrieved chunks (0.0-1.0)
    pub similarity_threshold: f64,
    /// Conversation turns returned to the prompt builder
    pub max_conversation_turns: i64,
    /// Days of inactivity before a session is evicted
    pub session_retention_days: i64,
    /// Secret for signing bearer and reset tokens
    pub jwt_secret_key: String,
    /// Access token lifetime in minutes
    pub jwt_access_token_expire_minutes: i64,
    /// SQLite database path
    pub database_path: PathBuf,
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Log filter (e.g. "info", "finchat=debug")
    pub log_level: String,
    /// Debug mode: forgot-password responses include the reset token
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            google_api_key: String::new(),
            gemini_chat_model: "models/gemini-2.5-flash".to_string(),
            gemini_embedding_model: "models/text-embedding-004".to_string(),
            gemini_temperature: 0.7,
            gemini_max_tokens: 500,
            chunk_size: 800,
            chunk_overlap: 100,
            max_file_size_mb: 10,
            top_k_chunks: 5,
            similarity_threshold: 0.7,
            max_conversation_turns: 20,
            session_retention_days: 30,
            jwt_secret_key: String::new(),
            jwt_access_token_expire_minutes: 30,
            database_path: PathBuf::from("./data/finchat.db"),
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    ///
    /// `GOOGLE_API_KEY` and `JWT_SECRET_KEY` are required.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        settings.google_api_key = require_var("GOOGLE_API_KEY")?;
        settings.jwt_secret_key = require_var("JWT_SECRET_KEY")?;

        if let Ok(v) = std::env::var("GEMINI_CHAT_MODEL") {
            settings.gemini_chat_model = v;
        }
        if let Ok(v) = std::env::var("GEMINI_EMBEDDING_MODEL") {
            settings.gemini_embedding_model = v;
        }
        if let Some(v) = parse_var("GEMINI_TEMPERATURE")? {
            settings.gemini_temperature = v;
        }
        if let Some(v) = parse_var("GEMINI_MAX_TOKENS")? {
            settings.gemini_max_tokens = v;
        }
        if let Some(v) = parse_var("CHUNK_SIZE")? {
            settings.chunk_size = v;
        }
        if let Some(v) = parse_var("CHUNK_OVERLAP")? {
            settings.chunk_overlap = v;
        }
        if let Some(v) = parse_var("MAX_FILE_SIZE_MB")? {
            settings.max_file_size_mb = v;
        }
        if let Some(v) = parse_var("TOP_K_CHUNKS")? {
            settings.top_k_chunks = v;
        }
        if let Some(v) = parse_var("SIMILARITY_THRESHOLD")? {
            settings.similarity_threshold = v;
        }
        if let Some(v) = parse_var("MAX_CONVERSATION_TURNS")? {
            settings.max_conversation_turns = v;
        }
        if let Some(v) = parse_var("SESSION_RETENTION_DAYS")? {
            settings.session_retention_days = v;
        }
        if let Some(v) = parse_var("JWT_ACCESS_TOKEN_EXPIRE_MINUTES")? {
            settings.jwt_access_token_expire_minutes = v;
        }
        if let Ok(v) = std::env::var("DATABASE_PATH") {
            settings.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("HOST") {
            settings.host = v;
        }
        if let Some(v) = parse_var("PORT")? {
            settings.port = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            settings.log_level = v;
        }
        if let Some(v) = parse_var("DEBUG")? {
            settings.debug = v;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if !(100..=2000).contains(&self.chunk_size) {
            return Err(Error::validation("chunk_size must be between 100 and 2000"));
        }
        if !(0..=500).contains(&self.chunk_overlap) {
            return Err(Error::validation("chunk_overlap must be between 0 and 500"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::validation(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(1..=20).contains(&self.top_k_chunks) {
            return Err(Error::validation("top_k_chunks must be between 1 and 20"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::validation(
                "similarity_threshold must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=2.0).contains(&self.gemini_temperature) {
            return Err(Error::validation(
                "gemini_temperature must be between 0.0 and 2.0",
            ));
        }
        if !(1..=8192).contains(&self.gemini_max_tokens) {
            return Err(Error::validation(
                "gemini_max_tokens must be between 1 and 8192",
            ));
        }
        if !(1..=100).contains(&self.max_file_size_mb) {
            return Err(Error::validation(
                "max_file_size_mb must be between 1 and 100",
            ));
        }
        if !(1..=100).contains(&self.max_conversation_turns) {
            return Err(Error::validation(
                "max_conversation_turns must be between 1 and 100",
            ));
        }
        if !(1..=1440).contains(&self.jwt_access_token_expire_minutes) {
            return Err(Error::validation(
                "jwt_access_token_expire_minutes must be between 1 and 1440",
            ));
        }
        Ok(())
    }

    /// Maximum upload size in bytes (decimal megabytes)
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb as usize * 1_000_000
    }
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::validation(format!("{name} environment variable is required")))
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::validation(format!("Invalid value for {name}: '{raw}'"))),
        Err(_) => Ok(None),
    }
}

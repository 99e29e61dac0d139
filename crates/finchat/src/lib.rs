//! finchat: multi-tenant RAG service for financial question answering
//!
//! Users upload PDF/DOCX/TXT documents which are chunked, embedded, and
//! indexed; authenticated queries retrieve the most relevant chunks,
//! interleave them with recent conversation history, and drive the Gemini
//! chat API to produce a sourced answer. An admin control plane covers user
//! lifecycle, document oversight, monitoring, analytics, an append-only
//! activity audit, and live-reloadable configuration.

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod providers;
pub mod rag;
pub mod server;
pub mod sessions;
pub mod storage;
pub mod types;
pub mod vector;

pub use config::Settings;
pub use error::{Error, Result};
pub use server::AppState;

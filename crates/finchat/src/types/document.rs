//! Document and chunk types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported upload file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    /// Detect file type from a filename extension
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        };
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "text" => Ok(Self::Txt),
            other => Err(Error::UnsupportedFileType(if other.is_empty() {
                "(none)".to_string()
            } else {
                other.to_string()
            })),
        }
    }

    /// Canonical extension string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

/// A document record in the record store.
///
/// The chunks themselves live in the vector index; this record carries the
/// bookkeeping the admin surface needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document id: `doc_` followed by a time-derived suffix
    pub id: String,
    /// Original filename as uploaded
    pub filename: String,
    /// Uploader user id
    pub uploader_user_id: String,
    /// Uploader username at upload time
    pub uploader_username: String,
    /// Upload timestamp
    pub upload_date: DateTime<Utc>,
    /// File extension
    pub file_type: String,
    /// Number of chunks created from this document
    pub chunk_count: i64,
    /// Approximate size in bytes
    pub file_size_bytes: i64,
}

/// Metadata attached to every chunk in the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
    pub file_type: String,
    pub file_size_bytes: i64,
    /// Absent on chunks indexed before uploader tracking existed
    pub uploader_user_id: Option<String>,
    pub uploader_username: Option<String>,
}

impl ChunkMetadata {
    /// Uploader username, with the sentinel for untracked chunks
    pub fn uploader_or_unknown(&self) -> &str {
        self.uploader_username.as_deref().unwrap_or("unknown")
    }
}

/// A chunk ready for the vector index: text, embedding, and metadata
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    /// Chunk id: `{document_id}_chunk_{index}`
    pub chunk_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Response body for a successful upload
#[derive(Debug, Serialize)]
pub struct DocumentUploadResponse {
    pub document_id: String,
    pub filename: String,
    pub chunks_created: i64,
    pub upload_date: DateTime<Utc>,
}

/// A document entry in list responses
#[derive(Debug, Serialize)]
pub struct DocumentInfo {
    pub id: String,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
    pub chunks: i64,
}

/// Response body for the document list endpoint
#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentInfo>,
}

/// Response body for document deletion
#[derive(Debug, Serialize)]
pub struct DocumentDeleteResponse {
    pub success: bool,
    pub chunks_deleted: usize,
}

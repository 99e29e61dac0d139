//! Document upload, listing, deletion, and stats

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use crate::error::{Error, Result};
use crate::server::extract::AuthUser;
use crate::server::state::AppState;
use crate::types::document::{
    DocumentDeleteResponse, DocumentInfo, DocumentListResponse, DocumentUploadResponse,
};

/// POST /api/v1/documents/upload (multipart)
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentUploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Failed to read multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            return Err(Error::validation("Uploaded file has no filename"));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("Failed to read uploaded file: {e}")))?;

        let response = state.pipeline().ingest(&user, &filename, &data).await?;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    Err(Error::validation("No file field in multipart body"))
}

/// GET /api/v1/documents
pub async fn list(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<DocumentListResponse>> {
    let documents = state
        .db()
        .list_documents()?
        .into_iter()
        .map(|doc| DocumentInfo {
            id: doc.id,
            filename: doc.filename,
            upload_date: doc.upload_date,
            chunks: doc.chunk_count,
        })
        .collect();
    Ok(Json(DocumentListResponse { documents }))
}

/// DELETE /api/v1/documents/{id}
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentDeleteResponse>> {
    tracing::info!(document_id, user = %user.username, "document deletion requested");
    let chunks_deleted = state.pipeline().delete_document(&document_id).await?;
    Ok(Json(DocumentDeleteResponse {
        success: true,
        chunks_deleted,
    }))
}

/// GET /api/v1/documents/stats
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let stats = state.vector_store().stats().await?;
    Ok(Json(serde_json::json!({
        "total_documents": stats.total_documents,
        "total_chunks": stats.total_chunks,
    })))
}

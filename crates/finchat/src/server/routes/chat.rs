//! Chat endpoint

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::extract::AuthUser;
use crate::server::state::AppState;
use crate::types::chat::{ChatRequest, ChatResponse};

/// Query length bounds
const MIN_QUERY_CHARS: usize = 1;
const MAX_QUERY_CHARS: usize = 2000;

/// POST /api/v1/chat
pub async fn chat_query(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let query = body.query.trim();
    let query_chars = query.chars().count();
    if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&query_chars) {
        return Err(Error::validation(format!(
            "Query must be between {MIN_QUERY_CHARS} and {MAX_QUERY_CHARS} characters"
        )));
    }
    if let Some(session_id) = body.session_id.as_deref() {
        if session_id.is_empty() || session_id.len() > 64 {
            return Err(Error::validation("Invalid session_id"));
        }
    }

    let response = state.engine().query(&user, query, body.session_id).await?;
    Ok(Json(response))
}

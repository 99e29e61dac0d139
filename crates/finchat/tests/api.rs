//! End-to-end API tests against the full router with fake providers

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use finchat::providers::chat::{ChatProvider, GenerationParams};
use finchat::providers::embedding::EmbeddingProvider;
use finchat::server::build_router;
use finchat::storage::Database;
use finchat::vector::MemoryVectorIndex;
use finchat::{AppState, Result, Settings};

/// Deterministic embedder: every text maps to the same direction, so any
/// indexed chunk scores 1.0 against any query
struct FixedEmbedder;

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed_query(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    async fn embed_document(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Chat fake that mirrors the provider contract: answers from documents when
/// the prompt carries a retrieval region, refuses for off-topic questions,
/// and otherwise answers from prior knowledge
struct ScriptedChat;

#[async_trait]
impl ChatProvider for ScriptedChat {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        if prompt.contains("=== RELEVANT FINANCIAL DOCUMENTS ===") {
            Ok("Based on the documents, Q4 revenue was $2.5M.".to_string())
        } else if prompt.contains("weather") {
            Ok("I'm a financial assistant and can only help with finance-related questions."
                .to_string())
        } else {
            Ok("Compound interest is interest earned on both principal and accumulated interest."
                .to_string())
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn test_state() -> AppState {
    let settings = Settings {
        google_api_key: "test-key".to_string(),
        jwt_secret_key: "test-secret".to_string(),
        debug: true,
        ..Settings::default()
    };
    AppState::new(
        settings,
        Database::in_memory().unwrap(),
        Arc::new(MemoryVectorIndex::new()),
        Arc::new(FixedEmbedder),
        Arc::new(ScriptedChat),
    )
    .unwrap()
}

async fn send(
    state: &AppState,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Upload a file through the multipart endpoint
async fn upload(
    state: &AppState,
    token: &str,
    filename: &str,
    content: &str,
) -> (StatusCode, serde_json::Value) {
    let boundary = "test-boundary-7f83a1";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         {content}\r\n\
         --{boundary}--\r\n"
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/documents/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

async fn register_and_login(state: &AppState, username: &str, email: &str) -> String {
    let (status, _) = send(
        state,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(serde_json::json!({
            "username": username,
            "email": email,
            "password": "Aa1!aa1!",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        state,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(serde_json::json!({ "username": username, "password": "Aa1!aa1!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

async fn promote_to_admin(state: &AppState, username: &str) {
    let user = state
        .db()
        .get_user_by_username(username)
        .unwrap()
        .unwrap();
    state.db().set_admin(&user.id, true).unwrap();
}

#[tokio::test]
async fn register_login_chat_on_empty_index() {
    let state = test_state();
    let token = register_and_login(&state, "alice", "alice@example.com").await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(&token),
        Some(serde_json::json!({ "query": "What is compound interest?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["response"].as_str().unwrap().is_empty());
    assert_eq!(body["sources"], serde_json::json!([]));
    assert!(!body["session_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn non_finance_query_gets_the_refusal() {
    let state = test_state();
    let token = register_and_login(&state, "alice", "alice@example.com").await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(&token),
        Some(serde_json::json!({ "query": "What's the weather today?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["response"]
        .as_str()
        .unwrap()
        .starts_with("I'm a financial assistant"));
    assert_eq!(body["sources"], serde_json::json!([]));
}

#[tokio::test]
async fn ingest_then_query_cites_the_document() {
    let state = test_state();
    let token = register_and_login(&state, "alice", "alice@example.com").await;

    let (status, uploaded) = upload(
        &state,
        &token,
        "q4.txt",
        "Q4 revenue was $2.5M, up 15% from Q3's $2.17M.",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(uploaded["chunks_created"], 1);
    let document_id = uploaded["document_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(&token),
        Some(serde_json::json!({ "query": "What was the Q4 revenue?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"][0]["document_id"], document_id);
    assert!(body["sources"][0]["relevance_score"].as_f64().unwrap() >= 0.7);
}

#[tokio::test]
async fn auth_gates_reject_missing_token_and_missing_role() {
    let state = test_state();

    let (status, _) = send(
        &state,
        "POST",
        "/api/v1/chat",
        None,
        Some(serde_json::json!({ "query": "What is a bond?" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = register_and_login(&state, "bob", "bob@example.com").await;
    let (status, _) = send(&state, "GET", "/api/v1/admin/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reset_token_is_single_use_over_http() {
    let state = test_state();
    register_and_login(&state, "alice", "alice@example.com").await;

    // Debug mode returns the token in the response
    let (status, body) = send(
        &state,
        "POST",
        "/api/v1/auth/forgot-password",
        None,
        Some(serde_json::json!({ "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["reset_token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &state,
        "POST",
        "/api/v1/auth/reset-password",
        None,
        Some(serde_json::json!({ "token": reset_token, "new_password": "Newpass1!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        "POST",
        "/api/v1/auth/reset-password",
        None,
        Some(serde_json::json!({ "token": reset_token, "new_password": "Another1!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forgot_password_response_is_indistinguishable() {
    let state = test_state();
    register_and_login(&state, "alice", "alice@example.com").await;

    let (status, known) = send(
        &state,
        "POST",
        "/api/v1/auth/forgot-password",
        None,
        Some(serde_json::json!({ "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, unknown) = send(
        &state,
        "POST",
        "/api/v1/auth/forgot-password",
        None,
        Some(serde_json::json!({ "email": "ghost@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(known["message"], unknown["message"]);
}

#[tokio::test]
async fn config_update_validates_and_audits() {
    let state = test_state();
    let token = register_and_login(&state, "root", "root@example.com").await;
    promote_to_admin(&state, "root").await;

    // Below the minimum of 100
    let (status, _) = send(
        &state,
        "PUT",
        "/api/v1/admin/config/chunk_size",
        Some(&token),
        Some(serde_json::json!({ "value": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = send(
        &state,
        "PUT",
        "/api/v1/admin/config/chunk_size",
        Some(&token),
        Some(serde_json::json!({ "value": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["value"], 1000);

    let (status, logs) = send(
        &state,
        "GET",
        "/api/v1/admin/activity?action=config_update",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["logs"][0]["resource_id"], "chunk_size");
    assert_eq!(logs["logs"][0]["details"]["old_value"], 800);
    assert_eq!(logs["logs"][0]["details"]["new_value"], 1000);
}

#[tokio::test]
async fn upload_delete_restores_stats() {
    let state = test_state();
    let token = register_and_login(&state, "alice", "alice@example.com").await;

    let (_, before) = send(&state, "GET", "/api/v1/documents/stats", Some(&token), None).await;

    let (_, uploaded) = upload(&state, &token, "temp.txt", "Cash flow improved in Q2.").await;
    let document_id = uploaded["document_id"].as_str().unwrap();

    let (status, deleted) = send(
        &state,
        "DELETE",
        &format!("/api/v1/documents/{document_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["chunks_deleted"], uploaded["chunks_created"]);

    let (_, after) = send(&state, "GET", "/api/v1/documents/stats", Some(&token), None).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn cross_user_session_is_forbidden() {
    let state = test_state();
    let alice = register_and_login(&state, "alice", "alice@example.com").await;
    let mallory = register_and_login(&state, "mallory", "mallory@example.com").await;

    let (_, first) = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(&alice),
        Some(serde_json::json!({ "query": "What is a bond?" })),
    )
    .await;
    let session_id = first["session_id"].as_str().unwrap();

    let (status, _) = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(&mallory),
        Some(serde_json::json!({ "query": "What is a bond?", "session_id": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn query_length_bounds_are_enforced() {
    let state = test_state();
    let token = register_and_login(&state, "alice", "alice@example.com").await;

    let (status, _) = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(&token),
        Some(serde_json::json!({ "query": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(&token),
        Some(serde_json::json!({ "query": "x".repeat(2001) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_force_reset_returns_temp_password_once() {
    let state = test_state();
    let admin_token = register_and_login(&state, "root", "root@example.com").await;
    promote_to_admin(&state, "root").await;
    register_and_login(&state, "carol", "carol@example.com").await;

    let carol = state.db().get_user_by_username("carol").unwrap().unwrap();
    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/v1/admin/users/{}/reset-password", carol.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let temp = body["temporary_password"].as_str().unwrap();
    assert_eq!(temp.chars().count(), 12);

    // The temp password logs in and the flag rides on the user view
    let (status, login) = send(
        &state,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(serde_json::json!({ "username": "carol", "password": temp })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["must_reset"], true);
}

#[tokio::test]
async fn health_endpoint_reports_components() {
    let state = test_state();
    let (status, body) = send(&state, "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["record_store_status"], "healthy");
    assert_eq!(body["vector_index_status"], "healthy");
}

#[tokio::test]
async fn error_envelope_carries_request_id_and_timestamp() {
    let state = test_state();
    let (status, body) = send(
        &state,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(serde_json::json!({ "username": "ghost", "password": "nope1234" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AuthenticationError");
    assert!(body["details"]["request_id"].as_str().is_some());
    assert!(body["timestamp"].as_str().is_some());
}

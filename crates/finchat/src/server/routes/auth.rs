//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::error::Result;
use crate::server::extract::AuthUser;
use crate::server::state::AppState;
use crate::types::user::{
    ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, PasswordChangeRequest,
    RegisterRequest, ResetPasswordRequest, TokenResponse, UserView,
};

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>)> {
    let view = state.auth().register(
        &body.username,
        &body.email,
        &body.password,
        body.full_name,
    )?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let (access_token, user) = state.auth().login(&body.username, &body.password)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user,
    }))
}

/// GET /api/v1/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserView> {
    Json(user.view())
}

/// POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<PasswordChangeRequest>,
) -> Result<Json<serde_json::Value>> {
    state
        .auth()
        .change_password(&user, &body.old_password, &body.new_password)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Password changed successfully"
    })))
}

/// POST /api/v1/auth/forgot-password
///
/// Replies identically whether or not the email exists; the token is included
/// only when the server runs in debug mode.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>> {
    let token = state.auth().forgot_password(&body.email)?;

    let reset_token = if state.settings().debug { token } else { None };
    Ok(Json(ForgotPasswordResponse {
        message: "If the email exists, a password reset link has been sent.".to_string(),
        reset_token,
    }))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    state.auth().reset_password(&body.token, &body.new_password)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Password reset successfully. You can now login with your new password."
    })))
}

//! User account records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account as stored in the record store
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user id
    pub id: String,
    /// Unique username
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Argon2 password hash
    pub password_hash: String,
    /// Optional display name
    pub full_name: Option<String>,
    /// Inactive users cannot authenticate
    pub is_active: bool,
    /// Admin role flag
    pub is_admin: bool,
    /// Set when an admin force-resets the password
    pub must_reset: bool,
    /// Outstanding password reset token, if any
    pub reset_token: Option<String>,
    /// When the outstanding reset token was issued
    pub reset_token_issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Public view of this user (never exposes the hash or reset token)
    pub fn view(&self) -> UserView {
        UserView {
            user_id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            is_active: self.is_active,
            is_admin: self.is_admin,
            must_reset: self.must_reset,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// User information safe to return from the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub must_reset: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response: bearer token plus the user view
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserView,
}

/// Change-password request body
#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Forgot-password request body
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Forgot-password response; the token is present only in debug mode
#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

/// Reset-password request body
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

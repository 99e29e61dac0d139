//! Credentials, bearer tokens, reset tokens, and the role gate

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::admin::config::ConfigManager;
use crate::error::{Error, Result};
use crate::storage::Database;
use crate::types::user::{User, UserView};

/// Reset tokens are valid for one hour
const RESET_TOKEN_LIFETIME_HOURS: i64 = 1;

const MIN_PASSWORD_LEN: usize = 8;

/// Bearer token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the username
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Reset token claims carry a type tag so access tokens can never be used to
/// reset a password
#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    email: String,
    token_type: String,
    iat: i64,
    exp: i64,
}

/// Handles registration, login, token verification, and password resets
pub struct AuthService {
    db: Arc<Database>,
    config: Arc<ConfigManager>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(db: Arc<Database>, config: Arc<ConfigManager>, secret: &str) -> Self {
        Self {
            db,
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    // ==================== Registration & login ====================

    /// Register a new user; username and email must be unique
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<UserView> {
        let username = username.trim();
        let email = email.trim();
        if username.len() < 3 || username.len() > 50 {
            return Err(Error::validation(
                "Username must be between 3 and 50 characters",
            ));
        }
        if !email.contains('@') || email.len() > 254 {
            return Err(Error::validation("Invalid email address"));
        }
        validate_password(password)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            full_name,
            is_active: true,
            is_admin: false,
            must_reset: false,
            reset_token: None,
            reset_token_issued_at: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        };

        self.db.insert_user(&user)?;
        tracing::info!(username, "user registered");
        Ok(user.view())
    }

    /// Authenticate and issue a bearer token.
    ///
    /// Wrong credentials and inactive accounts are indistinguishable to the
    /// caller. A user flagged `must_reset` still receives a token; the flag
    /// rides on the returned view so clients force the password change.
    pub fn login(&self, username: &str, password: &str) -> Result<(String, UserView)> {
        let invalid = || Error::Authentication("Incorrect username or password".to_string());

        let user = self
            .db
            .get_user_by_username(username)?
            .ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash) {
            tracing::warn!(username, "login failed: bad password");
            return Err(invalid());
        }
        if !user.is_active {
            tracing::warn!(username, "login rejected: inactive account");
            return Err(invalid());
        }

        self.db.set_last_login(&user.id)?;
        let token = self.issue_token(&user.username)?;

        tracing::info!(username, "login successful");
        let mut view = user.view();
        view.last_login = Some(Utc::now());
        Ok((token, view))
    }

    /// Mint a bearer token for a username
    fn issue_token(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let lifetime = Duration::minutes(self.config.snapshot().access_token_expire_minutes);
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("Failed to encode token: {e}")))
    }

    // ==================== Verification ====================

    /// Decode a bearer token and resolve the active user behind it
    pub fn verify_token(&self, token: &str) -> Result<User> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::Authentication("Token has expired".to_string())
                }
                _ => Error::Authentication("Invalid authentication credentials".to_string()),
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(Error::Authentication(
                "Invalid authentication credentials".to_string(),
            ));
        }

        let user = self
            .db
            .get_user_by_username(&claims.sub)?
            .ok_or_else(|| Error::Authentication("User not found".to_string()))?;
        if !user.is_active {
            return Err(Error::Authentication(
                "User account is inactive".to_string(),
            ));
        }
        Ok(user)
    }

    /// Admin role gate
    pub fn require_admin(user: &User) -> Result<()> {
        if user.is_admin {
            Ok(())
        } else {
            Err(Error::Authorization("Admin access required".to_string()))
        }
    }

    // ==================== Password lifecycle ====================

    /// Change a user's own password after verifying the old one
    pub fn change_password(&self, user: &User, old_password: &str, new_password: &str) -> Result<()> {
        if !verify_password(old_password, &user.password_hash) {
            return Err(Error::validation("Invalid old password"));
        }
        validate_password(new_password)?;
        self.db
            .update_password(&user.id, &hash_password(new_password)?, true)?;
        tracing::info!(username = %user.username, "password changed");
        Ok(())
    }

    /// First step of the reset flow.
    ///
    /// Returns the signed reset token when the email belongs to an active
    /// user, None otherwise; the HTTP layer replies identically either way so
    /// accounts cannot be enumerated.
    pub fn forgot_password(&self, email: &str) -> Result<Option<String>> {
        let user = match self.db.get_user_by_email(email)? {
            Some(user) if user.is_active => user,
            Some(_) => {
                tracing::warn!("password reset requested for inactive account");
                return Ok(None);
            }
            None => {
                tracing::info!("password reset requested for unknown email");
                return Ok(None);
            }
        };

        let now = Utc::now();
        let claims = ResetClaims {
            sub: user.username.clone(),
            email: email.to_string(),
            token_type: "password_reset".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(RESET_TOKEN_LIFETIME_HOURS)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("Failed to encode reset token: {e}")))?;

        self.db.set_reset_token(&user.id, &token, now)?;
        tracing::info!(username = %user.username, "password reset token created");
        Ok(Some(token))
    }

    /// Second step: verify the token, set the new password, and clear the
    /// reset fields atomically. Each token works at most once.
    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        validate_password(new_password)?;

        let invalid = || Error::validation("Invalid or expired reset token");

        let claims = decode::<ResetClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| invalid())?
            .claims;
        if claims.token_type != "password_reset" {
            return Err(invalid());
        }

        let user = self
            .db
            .get_user_by_username(&claims.sub)?
            .filter(|u| u.email == claims.email)
            .ok_or_else(invalid)?;

        // The conditional update is what makes the token single-use: it only
        // succeeds while the stored token still matches.
        let consumed = self
            .db
            .consume_reset_token(&user.id, token, &hash_password(new_password)?)?;
        if !consumed {
            tracing::warn!(username = %user.username, "reset token already used or superseded");
            return Err(invalid());
        }

        tracing::info!(username = %user.username, "password reset successful");
        Ok(())
    }

    /// Generate a 12-character temporary password with at least one
    /// uppercase, lowercase, digit, and symbol
    pub fn generate_temp_password() -> String {
        const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
        const DIGITS: &[u8] = b"0123456789";
        const SYMBOLS: &[u8] = b"!@#$%^&*";

        let mut rng = rand::thread_rng();
        let mut password = vec![
            UPPER[rng.gen_range(0..UPPER.len())],
            LOWER[rng.gen_range(0..LOWER.len())],
            DIGITS[rng.gen_range(0..DIGITS.len())],
            SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
        ];

        let all: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS].concat();
        for _ in 0..8 {
            password.push(all[rng.gen_range(0..all.len())]);
        }
        password.shuffle(&mut rng);

        String::from_utf8(password).expect("temp password alphabet is ASCII")
    }

    /// Hash a password for storage (used by the admin reset path)
    pub fn hash(&self, password: &str) -> Result<String> {
        hash_password(password)
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::internal(format!("Failed to hash password: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

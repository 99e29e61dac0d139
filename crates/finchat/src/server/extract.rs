//! Request extractors for authentication and the admin gate

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use crate::admin::AdminActor;
use crate::auth::AuthService;
use crate::error::Error;
use crate::types::user::User;

use super::state::AppState;

/// Slot the metrics middleware plants in request extensions so extractors can
/// report who the request belonged to
#[derive(Clone, Default)]
pub struct RequestUserSlot(pub Arc<OnceLock<String>>);

/// The authenticated user behind a bearer token
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = state.auth().verify_token(token)?;

        if let Some(slot) = parts.extensions.get::<RequestUserSlot>() {
            let _ = slot.0.set(user.id.clone());
        }
        Ok(AuthUser(user))
    }
}

/// An authenticated user that also passed the admin role gate.
///
/// Carries the actor identity (with client address) that admin services need
/// for audit entries.
pub struct AdminUser {
    pub user: User,
    pub actor: AdminActor,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        AuthService::require_admin(&user)?;

        let actor = AdminActor {
            id: user.id.clone(),
            username: user.username.clone(),
            client_addr: client_addr(parts),
        };
        Ok(AdminUser { user, actor })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, Error> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Authentication("Not authenticated".to_string()))
}

/// Best-effort client address: proxy header first, then the socket
fn client_addr(parts: &Parts) -> Option<String> {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

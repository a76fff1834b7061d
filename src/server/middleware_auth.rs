//! Session token auth for login-required routes.
//!
//! Extracts the session JWT from the `Authorization: Bearer <token>` header,
//! verifies it with HS256 against the configured secret, and looks up the
//! user's access level from `user_roles`. The token carries the GitHub login
//! (`sub`) and the user's GitHub access token (`gh_token`), which is needed
//! for repository permission checks.

use anyhow::Result;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::AppState;
use crate::context::Actor;
use crate::error::ApiError;
use crate::release::AccessLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// GitHub login.
    pub sub: String,
    pub gh_token: String,
    pub exp: usize,
}

/// Issue a session token. Used by the login flow and by tests.
pub fn encode_session_token(
    secret: &str,
    login: &str,
    gh_token: &str,
    ttl: Duration,
) -> Result<String> {
    let exp = chrono::Utc::now().timestamp().max(0) as usize + ttl.as_secs() as usize;
    let claims = SessionClaims {
        sub: login.to_string(),
        gh_token: gh_token.to_string(),
        exp,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<SessionClaims, String> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<SessionClaims>(token, &key, &validation)
        .map_err(|e| format!("session token rejected: {}", e))?;
    if data.claims.sub.is_empty() {
        return Err("session token has no subject".to_string());
    }
    Ok(data.claims)
}

/// Resolve the acting user from the request headers.
pub async fn extract_actor(state: &Arc<AppState>, parts: &Parts) -> Result<Actor, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Authentication required".to_string());
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;
    let token = auth_header.strip_prefix("Bearer ").ok_or_else(unauthorized)?;
    let claims = decode_session_token(&state.jwt_secret, token).map_err(|e| {
        warn!(error = %e, "rejected session token");
        unauthorized()
    })?;

    let level = state
        .db
        .get_access_level(&claims.sub)
        .await
        .unwrap_or_else(|e| {
            warn!(user = %claims.sub, error = %e, "access level lookup failed, treating as none");
            AccessLevel::None
        });

    Ok(Actor {
        login: claims.sub,
        access_token: claims.gh_token,
        level,
    })
}

/// Axum extractor that requires a signed-in user.
///
/// Returns 401 if no valid session token is present.
pub struct RequireSession(pub Actor);

impl FromRequestParts<Arc<AppState>> for RequireSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        extract_actor(state, parts).await.map(RequireSession)
    }
}

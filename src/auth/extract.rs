//! Claim extractors guarding protected routes.
//!
//! A missing Authorization header is a 403; a header that fails verification
//! (bad signature, expired, malformed) is a 401.

use crate::auth::token::{verify, Claims};
use crate::error::AppError;
use crate::state::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts.headers.get(AUTHORIZATION).ok_or(AppError::Forbidden)?;
    let value = header.to_str().map_err(|_| AppError::Unauthorized)?;
    Ok(value.strip_prefix("Bearer ").unwrap_or(value).trim())
}

/// Verified access token claims.
pub struct AuthClaims(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let claims = verify(token, &state.config.jwt.key, state.config.jwt.algorithm)
            .ok_or(AppError::Unauthorized)?;
        Ok(AuthClaims(claims))
    }
}

/// Verified refresh token claims (signed with the refresh secret), plus the
/// raw token so the handler can check it against the store.
pub struct RefreshClaims {
    pub claims: Claims,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for RefreshClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?.to_string();
        let claims = verify(&token, &state.config.jwt.key_refresh, state.config.jwt.algorithm)
            .ok_or(AppError::Unauthorized)?;
        Ok(RefreshClaims { claims, token })
    }
}

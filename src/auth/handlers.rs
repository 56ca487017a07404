//! Login and token refresh endpoints.

use crate::auth::extract::RefreshClaims;
use crate::auth::password::verify_password;
use crate::auth::token::{self, Identity};
use crate::error::AppError;
use crate::resource::users;
use crate::response::ApiResponse;
use crate::service::{Envelope, Payload, QueryOutcome};
use crate::state::AppState;
use axum::extract::{ConnectInfo, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(login))
        .route("/refresh", post(refresh))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

fn client_fingerprint(addr: &SocketAddr, headers: &HeaderMap) -> (String, String) {
    let ip = addr.ip().to_string();
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    (ip, user_agent)
}

fn user_id(row: &Value) -> Result<i64, AppError> {
    row.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::Internal("user row without a numeric id".into()))
}

fn bundle_response(bundle: token::TokenBundle) -> Result<ApiResponse, AppError> {
    let value = serde_json::to_value(&bundle)
        .map_err(|e| AppError::Internal(format!("token bundle serialization failed: {e}")))?;
    let envelope = Envelope {
        total_data: 1,
        limit: 0,
        page: 1,
        data: Payload::Row(value),
    };
    Ok(ApiResponse::success(envelope, 200))
}

/// Issue a token pair for valid credentials. An unknown or inactive user is a
/// 404; a wrong password is a 401.
async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<ApiResponse, AppError> {
    if body.username.is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest("username and password are required".into()));
    }

    let user = match users::find_credentials(&state.pool, &body.username).await {
        QueryOutcome::One(row) => row,
        _ => return Err(AppError::NotFoundData),
    };

    let stored = user.get("password").and_then(Value::as_str).unwrap_or("");
    if !verify_password(&body.password, stored) {
        return Err(AppError::Unauthorized);
    }

    let (ip_address, user_agent) = client_fingerprint(&addr, &headers);
    let identity = Identity {
        id: user_id(&user)?,
        ip_address,
        user_agent,
    };
    let bundle = token::issue(&state.pool, &state.config, &identity).await?;
    tracing::info!(user_id = identity.id, "login");
    bundle_response(bundle)
}

/// Exchange a stored refresh token for a new pair. The token must be in the
/// store and its fingerprint must match the calling connection.
async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    presented: RefreshClaims,
) -> Result<ApiResponse, AppError> {
    if !token::registered(&state.pool, &presented.token).await {
        return Err(AppError::Unauthorized);
    }

    let (ip_address, user_agent) = client_fingerprint(&addr, &headers);
    if !token::fingerprint_matches(&presented.claims, &ip_address, &user_agent) {
        return Err(AppError::Unauthorized);
    }

    let user = match users::find_active(&state.pool, presented.claims.id).await {
        QueryOutcome::One(row) => row,
        _ => return Err(AppError::NotFoundData),
    };

    let identity = Identity {
        id: user_id(&user)?,
        ip_address,
        user_agent,
    };
    let bundle = token::issue(&state.pool, &state.config, &identity).await?;
    tracing::info!(user_id = identity.id, "token refresh");
    bundle_response(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_defaults_to_empty_user_agent() {
        let addr: SocketAddr = "10.0.0.9:55000".parse().unwrap();
        let (ip, ua) = client_fingerprint(&addr, &HeaderMap::new());
        assert_eq!(ip, "10.0.0.9");
        assert_eq!(ua, "");
    }

    #[test]
    fn user_id_requires_numeric_id() {
        assert!(user_id(&json!({ "id": 7 })).is_ok());
        assert!(user_id(&json!({ "id": "7" })).is_err());
        assert!(user_id(&json!({})).is_err());
    }
}

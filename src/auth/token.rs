//! JWT issuance, verification, and refresh-token persistence.
//!
//! Access and refresh tokens are signed with separate secrets. Every issued
//! refresh token is upserted into the `refresh_tokens` table, one row per
//! (user, user agent), so a refresh can be checked against the store before
//! new tokens are minted.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::service::{QueryOutcome, QueryService};
use crate::sql::{format_timestamp, BulkSpec, QuerySpec};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

pub const REFRESH_TOKEN_TABLE: &str = "refresh_tokens";

/// Who is being issued tokens, as seen by the server.
#[derive(Clone, Debug)]
pub struct Identity {
    pub id: i64,
    pub ip_address: String,
    pub user_agent: String,
}

/// Claims carried by both token kinds. The client fingerprint (ip and user
/// agent) is embedded so a refresh can be matched against the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub iat: i64,
    pub exp: i64,
}

/// What a successful login or refresh hands back to the client.
#[derive(Clone, Debug, Serialize)]
pub struct TokenBundle {
    pub id: i64,
    pub token: String,
    pub token_expires_in: String,
    pub refresh_token: String,
    pub refresh_token_expires_in: String,
}

fn sign(
    identity: &Identity,
    key: &str,
    algorithm: Algorithm,
    iat: i64,
    exp: i64,
) -> Result<String, AppError> {
    let claims = Claims {
        id: identity.id,
        ip_address: identity.ip_address.clone(),
        user_agent: identity.user_agent.clone(),
        iat,
        exp,
    };
    encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// Decode and validate a token against the given secret. Anything wrong with
/// it (bad signature, expired, malformed) is simply `None`.
pub fn verify(token: &str, key: &str, algorithm: Algorithm) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(key.as_bytes()),
        &Validation::new(algorithm),
    )
    .map(|data| data.claims)
    .ok()
}

/// Mint an access/refresh token pair and persist the refresh token, replacing
/// any previous one for the same user and user agent.
pub async fn issue(
    pool: &PgPool,
    config: &AppConfig,
    identity: &Identity,
) -> Result<TokenBundle, AppError> {
    let now = Utc::now();
    let iat = now.timestamp();
    let expires = now + config.jwt.expire;
    let refresh_expires = now + config.jwt.expire_refresh;
    let tz = config.timezone;

    let token = sign(identity, &config.jwt.key, config.jwt.algorithm, iat, expires.timestamp())?;
    let refresh_token = sign(
        identity,
        &config.jwt.key_refresh,
        config.jwt.algorithm,
        iat,
        refresh_expires.timestamp(),
    )?;

    let row = json!({
        "user_id": identity.id,
        "user_agent": identity.user_agent.replace(' ', ""),
        "ip_address": identity.ip_address,
        "token": refresh_token,
        "expired": format_timestamp(refresh_expires, tz),
        "updated": format_timestamp(now, tz),
    });
    let serde_json::Value::Object(row) = row else {
        return Err(AppError::Internal("refresh token row must be an object".into()));
    };

    let spec = BulkSpec {
        table: REFRESH_TOKEN_TABLE.into(),
        rows: vec![row],
        conflict_columns: vec!["user_id".into(), "user_agent".into()],
        ..Default::default()
    };
    match QueryService::upsert_many(pool, &spec, tz).await {
        QueryOutcome::Written { affected, .. } if affected > 0 => Ok(TokenBundle {
            id: identity.id,
            token,
            token_expires_in: format_timestamp(expires, tz),
            refresh_token,
            refresh_token_expires_in: format_timestamp(refresh_expires, tz),
        }),
        _ => Err(AppError::Internal("refresh token could not be stored".into())),
    }
}

/// Whether a refresh token is present in the store.
pub async fn registered(pool: &PgPool, token: &str) -> bool {
    let mut conditions = serde_json::Map::new();
    conditions.insert("token".into(), json!(token));
    let spec = QuerySpec {
        table: REFRESH_TOKEN_TABLE.into(),
        conditions,
        ..Default::default()
    };
    matches!(QueryService::get_detail(pool, &spec).await, QueryOutcome::One(_))
}

/// Compare the claims fingerprint with the connection the refresh request
/// arrived on. The stored user agent has its spaces stripped, so strip here
/// too before comparing.
pub fn fingerprint_matches(claims: &Claims, ip_address: &str, user_agent: &str) -> bool {
    claims.ip_address == ip_address
        && claims.user_agent.replace(' ', "") == user_agent.replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: 7,
            ip_address: "10.0.0.9".into(),
            user_agent: "Mozilla/5.0 Test".into(),
        }
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let now = Utc::now().timestamp();
        let token = sign(&identity(), "secret", Algorithm::HS256, now, now + 60).unwrap();
        let claims = verify(&token, "secret", Algorithm::HS256).unwrap();
        assert_eq!(claims.id, 7);
        assert_eq!(claims.ip_address, "10.0.0.9");
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let now = Utc::now().timestamp();
        let token = sign(&identity(), "secret", Algorithm::HS256, now, now + 60).unwrap();
        assert!(verify(&token, "other", Algorithm::HS256).is_none());
    }

    #[test]
    fn expired_token_fails_verification() {
        let now = Utc::now().timestamp();
        let token = sign(&identity(), "secret", Algorithm::HS256, now - 600, now - 300).unwrap();
        assert!(verify(&token, "secret", Algorithm::HS256).is_none());
    }

    #[test]
    fn fingerprint_ignores_user_agent_spacing() {
        let claims = Claims {
            id: 7,
            ip_address: "10.0.0.9".into(),
            user_agent: "Mozilla/5.0 Test".into(),
            iat: 0,
            exp: 0,
        };
        assert!(fingerprint_matches(&claims, "10.0.0.9", "Mozilla/5.0Test"));
        assert!(!fingerprint_matches(&claims, "10.0.0.8", "Mozilla/5.0 Test"));
        assert!(!fingerprint_matches(&claims, "10.0.0.9", "Other"));
    }
}

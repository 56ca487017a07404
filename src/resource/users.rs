//! Users resource: account rows joined to their user level.

use crate::auth::password::hash_password;
use crate::auth::AuthClaims;
use crate::error::AppError;
use crate::resource::{query_conditions, respond_detail, respond_list, respond_write};
use crate::response::ApiResponse;
use crate::service::{QueryOutcome, QueryService};
use crate::sql::{ConditionTypes, DeleteSpec, InsertSpec, QuerySpec, UpdateSpec};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

pub const TABLE: &str = "users";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(detail).put(update).delete(remove))
}

fn protected() -> Vec<String> {
    vec!["id".into()]
}

fn level_join() -> Vec<String> {
    vec![format!(
        "LEFT JOIN user_levels ON user_levels.id = {TABLE}.user_level_id"
    )]
}

fn level_column() -> Vec<String> {
    vec!["user_levels.name AS user_level".into()]
}

fn list_spec(mut conditions: Map<String, Value>) -> QuerySpec {
    let mut custom_conditions = Vec::new();
    // `alias_id` excludes nothing; it pins the listing to one id while the
    // rest of the filters still apply. Only a numeric value is accepted.
    if let Some(alias) = conditions.remove("alias_id") {
        if let Some(id) = alias.as_str().and_then(|s| s.parse::<i64>().ok()) {
            custom_conditions.push(format!("{TABLE}.id = {id}"));
        }
    }
    QuerySpec {
        table: TABLE.into(),
        conditions,
        condition_types: ConditionTypes {
            like: vec!["username".into(), "fullname".into(), "email".into()],
            date: vec![],
        },
        custom_conditions,
        column_deselect: vec!["password".into()],
        custom_columns: level_column(),
        joins: level_join(),
        ..Default::default()
    }
}

fn detail_spec(conditions: Map<String, Value>) -> QuerySpec {
    QuerySpec {
        table: TABLE.into(),
        conditions,
        column_deselect: vec!["password".into()],
        custom_columns: level_column(),
        joins: level_join(),
        ..Default::default()
    }
}

/// Credentials lookup for login: active user by username, password hash
/// included.
pub async fn find_credentials(pool: &PgPool, username: &str) -> QueryOutcome {
    let mut conditions = Map::new();
    conditions.insert("username".into(), json!(username));
    conditions.insert("is_active".into(), json!(true));
    let spec = QuerySpec {
        table: TABLE.into(),
        conditions,
        ..Default::default()
    };
    QueryService::get_detail(pool, &spec).await
}

/// Active user by id, for the refresh flow.
pub async fn find_active(pool: &PgPool, id: i64) -> QueryOutcome {
    let mut conditions = Map::new();
    conditions.insert("id".into(), json!(id));
    conditions.insert("is_active".into(), json!(true));
    let spec = QuerySpec {
        table: TABLE.into(),
        conditions,
        ..Default::default()
    };
    QueryService::get_detail(pool, &spec).await
}

/// Replace a plaintext `password` entry with its Argon2id hash.
fn hash_password_field(body: &mut Map<String, Value>) -> Result<(), AppError> {
    if let Some(Value::String(plain)) = body.get("password") {
        let hashed = hash_password(plain)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
        body.insert("password".into(), Value::String(hashed));
    }
    Ok(())
}

async fn list(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResponse {
    let spec = list_spec(query_conditions(pairs));
    respond_list(QueryService::get_all(&state.pool, &spec, state.config.timezone).await)
}

async fn detail(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Path(id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let mut conditions = Map::new();
    conditions.insert("id".into(), Value::String(id));
    let spec = detail_spec(conditions);
    respond_detail(QueryService::get_detail(&state.pool, &spec).await)
}

async fn create(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Json(mut body): Json<Map<String, Value>>,
) -> Result<ApiResponse, AppError> {
    hash_password_field(&mut body)?;
    let spec = InsertSpec {
        table: TABLE.into(),
        data: body,
        protected_columns: protected(),
        ..Default::default()
    };
    respond_write(
        QueryService::insert(&state.pool, &spec, state.config.timezone).await,
        201,
    )
}

async fn update(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Path(id): Path<String>,
    Json(mut body): Json<Map<String, Value>>,
) -> Result<ApiResponse, AppError> {
    hash_password_field(&mut body)?;
    let mut conditions = Map::new();
    conditions.insert("id".into(), Value::String(id));
    let spec = UpdateSpec {
        table: TABLE.into(),
        data: body,
        conditions,
        protected_columns: protected(),
        ..Default::default()
    };
    respond_write(
        QueryService::update(&state.pool, &spec, state.config.timezone).await,
        200,
    )
}

async fn remove(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Path(id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let mut conditions = Map::new();
    conditions.insert("id".into(), Value::String(id));
    let spec = DeleteSpec {
        table: TABLE.into(),
        conditions,
    };
    respond_write(QueryService::delete(&state.pool, &spec).await, 200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_spec_hides_password_and_joins_levels() {
        let spec = list_spec(Map::new());
        assert_eq!(spec.column_deselect, vec!["password"]);
        assert!(spec.joins[0].contains("user_levels"));
        assert!(spec.condition_types.is_like("username"));
    }

    #[test]
    fn alias_id_accepts_only_numbers() {
        let mut conditions = Map::new();
        conditions.insert("alias_id".into(), json!("7"));
        assert_eq!(list_spec(conditions).custom_conditions, vec!["users.id = 7"]);

        let mut conditions = Map::new();
        conditions.insert("alias_id".into(), json!("7 OR 1=1"));
        assert!(list_spec(conditions).custom_conditions.is_empty());
    }

    #[test]
    fn password_field_is_hashed_in_place() {
        let mut body = Map::new();
        body.insert("password".into(), json!("s3cret"));
        hash_password_field(&mut body).unwrap();
        let stored = body["password"].as_str().unwrap();
        assert_ne!(stored, "s3cret");
        assert!(crate::auth::password::verify_password("s3cret", stored));
    }
}

//! Customers resource: audit joins back to the users table. Writes stamp the
//! audit columns from the caller's token when the body omits them.

use crate::auth::AuthClaims;
use crate::error::AppError;
use crate::resource::{query_conditions, respond_detail, respond_list, respond_write, stamp_audit};
use crate::response::ApiResponse;
use crate::service::QueryService;
use crate::sql::{ConditionTypes, DeleteSpec, InsertSpec, QuerySpec, UpdateSpec};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};

pub const TABLE: &str = "customers";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(detail).put(update).delete(remove))
}

fn audit_joins() -> Vec<String> {
    vec![
        format!("LEFT JOIN users AS created_users ON created_users.id = {TABLE}.created_user_id"),
        format!("LEFT JOIN users AS updated_users ON updated_users.id = {TABLE}.updated_user_id"),
    ]
}

fn audit_columns() -> Vec<String> {
    vec![
        "created_users.fullname AS created_user".into(),
        "updated_users.fullname AS updated_user".into(),
    ]
}

/// `idx` excludes one id from the result. Only a numeric value is accepted.
fn idx_exclusion(conditions: &mut Map<String, Value>) -> Vec<String> {
    let mut custom = Vec::new();
    if let Some(idx) = conditions.remove("idx") {
        if let Some(id) = idx.as_str().and_then(|s| s.parse::<i64>().ok()) {
            custom.push(format!("{TABLE}.id <> {id}"));
        }
    }
    custom
}

fn list_spec(mut conditions: Map<String, Value>) -> QuerySpec {
    let custom_conditions = idx_exclusion(&mut conditions);
    QuerySpec {
        table: TABLE.into(),
        conditions,
        condition_types: ConditionTypes {
            like: vec!["name".into()],
            date: vec![],
        },
        custom_conditions,
        custom_columns: audit_columns(),
        joins: audit_joins(),
        group_by: vec!["id".into()],
        ..Default::default()
    }
}

fn detail_spec(mut conditions: Map<String, Value>) -> QuerySpec {
    let custom_conditions = idx_exclusion(&mut conditions);
    QuerySpec {
        table: TABLE.into(),
        conditions,
        custom_conditions,
        custom_columns: audit_columns(),
        joins: audit_joins(),
        ..Default::default()
    }
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
    claims: AuthClaims,
    Json(mut body): Json<Map<String, Value>>,
) -> Result<ApiResponse, AppError> {
    stamp_audit(&mut body, "created", claims.0.id, state.config.timezone);
    let spec = InsertSpec {
        table: TABLE.into(),
        data: body,
        protected_columns: vec!["id".into()],
        ..Default::default()
    };
    respond_write(
        QueryService::insert(&state.pool, &spec, state.config.timezone).await,
        201,
    )
}

async fn update(
    State(state): State<AppState>,
    claims: AuthClaims,
    Path(id): Path<String>,
    Json(mut body): Json<Map<String, Value>>,
) -> Result<ApiResponse, AppError> {
    stamp_audit(&mut body, "updated", claims.0.id, state.config.timezone);
    let mut conditions = Map::new();
    conditions.insert("id".into(), Value::String(id));
    let spec = UpdateSpec {
        table: TABLE.into(),
        data: body,
        conditions,
        protected_columns: vec!["id".into()],
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
    use serde_json::json;

    #[test]
    fn list_spec_joins_users_twice_and_groups() {
        let spec = list_spec(Map::new());
        assert_eq!(spec.joins.len(), 2);
        assert!(spec.joins[0].contains("created_users"));
        assert!(spec.joins[1].contains("updated_users"));
        assert_eq!(spec.group_by, vec!["id"]);
    }

    #[test]
    fn idx_exclusion_rejects_non_numeric_input() {
        let mut conditions = Map::new();
        conditions.insert("idx".into(), json!("4"));
        assert_eq!(idx_exclusion(&mut conditions), vec!["customers.id <> 4"]);
        assert!(conditions.get("idx").is_none());

        let mut conditions = Map::new();
        conditions.insert("idx".into(), json!("4; DROP TABLE customers"));
        assert!(idx_exclusion(&mut conditions).is_empty());
    }

    #[test]
    fn writes_stamp_audit_columns_from_token() {
        let tz = chrono::FixedOffset::east_opt(7 * 3600).unwrap();
        let mut body = Map::new();
        body.insert("name".into(), json!("Acme"));
        stamp_audit(&mut body, "created", 3, tz);
        assert_eq!(body["created_user_id"], json!(3));
        assert!(body["created_date"].as_str().is_some());
    }
}

//! Provinces resource: plain table, no joins.

use crate::auth::AuthClaims;
use crate::error::AppError;
use crate::resource::{query_conditions, respond_detail, respond_list, respond_write};
use crate::response::ApiResponse;
use crate::service::QueryService;
use crate::sql::{ConditionTypes, DeleteSpec, InsertSpec, QuerySpec, UpdateSpec};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};

pub const TABLE: &str = "provinces";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(detail).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResponse {
    let spec = QuerySpec {
        table: TABLE.into(),
        conditions: query_conditions(pairs),
        condition_types: ConditionTypes {
            like: vec!["name".into()],
            date: vec![],
        },
        ..Default::default()
    };
    respond_list(QueryService::get_all(&state.pool, &spec, state.config.timezone).await)
}

async fn detail(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Path(id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let mut conditions = Map::new();
    conditions.insert("id".into(), Value::String(id));
    let spec = QuerySpec {
        table: TABLE.into(),
        conditions,
        ..Default::default()
    };
    respond_detail(QueryService::get_detail(&state.pool, &spec).await)
}

async fn create(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Json(body): Json<Map<String, Value>>,
) -> Result<ApiResponse, AppError> {
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
    _claims: AuthClaims,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<ApiResponse, AppError> {
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

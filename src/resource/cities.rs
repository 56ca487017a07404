//! Cities resource: joined to provinces for a computed province name.

use crate::auth::AuthClaims;
use crate::error::AppError;
use crate::resource::{query_conditions, respond_detail, respond_list, respond_write};
use crate::response::ApiResponse;
use crate::service::QueryService;
use crate::sql::{quote_literal, ConditionTypes, DeleteSpec, InsertSpec, QuerySpec, UpdateSpec};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};

pub const TABLE: &str = "cities";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(detail).put(update).delete(remove))
}

fn province_join() -> Vec<String> {
    vec![format!(
        "LEFT JOIN provinces ON provinces.id = {TABLE}.province_id"
    )]
}

fn province_column() -> Vec<String> {
    vec!["provinces.name AS province".into()]
}

/// Raw conditions carried by the query string: `idx` excludes one id
/// (numbers only), `province` substring-matches the joined province name
/// (quoted before interpolation).
fn raw_conditions(conditions: &mut Map<String, Value>) -> Vec<String> {
    let mut custom = Vec::new();
    if let Some(idx) = conditions.remove("idx") {
        if let Some(id) = idx.as_str().and_then(|s| s.parse::<i64>().ok()) {
            custom.push(format!("{TABLE}.id <> {id}"));
        }
    }
    if let Some(province) = conditions.remove("province") {
        if let Some(name) = province.as_str() {
            custom.push(format!(
                "provinces.name ILIKE {}",
                quote_literal(&format!("%{name}%"))
            ));
        }
    }
    custom
}

fn list_spec(mut conditions: Map<String, Value>) -> QuerySpec {
    let custom_conditions = raw_conditions(&mut conditions);
    QuerySpec {
        table: TABLE.into(),
        conditions,
        condition_types: ConditionTypes {
            like: vec!["name".into()],
            date: vec![],
        },
        custom_conditions,
        custom_columns: province_column(),
        joins: province_join(),
        group_by: vec!["id".into()],
        ..Default::default()
    }
}

fn detail_spec(mut conditions: Map<String, Value>) -> QuerySpec {
    let custom_conditions = raw_conditions(&mut conditions);
    QuerySpec {
        table: TABLE.into(),
        conditions,
        custom_conditions,
        custom_columns: province_column(),
        joins: province_join(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn province_filter_is_quoted_before_interpolation() {
        let mut conditions = Map::new();
        conditions.insert("province".into(), json!("Jawa' OR 1=1 --"));
        let custom = raw_conditions(&mut conditions);
        assert_eq!(custom, vec!["provinces.name ILIKE '%Jawa'' OR 1=1 --%'"]);
    }

    #[test]
    fn idx_and_province_leave_regular_conditions_alone() {
        let mut conditions = Map::new();
        conditions.insert("idx".into(), json!("9"));
        conditions.insert("name".into(), json!("Band"));
        let custom = raw_conditions(&mut conditions);
        assert_eq!(custom, vec!["cities.id <> 9"]);
        assert!(conditions.contains_key("name"));
    }
}

//! Declarative resource controllers feeding the generic query core.
//!
//! Each module states its table, joins, computed columns, condition types and
//! protected columns; the query core does the rest.

pub mod cities;
pub mod customers;
pub mod product_categories;
pub mod provinces;
pub mod user_levels;
pub mod users;

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::service::QueryOutcome;
use crate::sql::format_timestamp;
use chrono::{FixedOffset, Utc};
use serde_json::{json, Map, Value};

/// Query-string pairs as a condition map, in arrival order. Values stay
/// strings; the builder casts them against the live column types.
pub(crate) fn query_conditions(pairs: Vec<(String, String)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

/// Fill `{prefix}_date` / `{prefix}_user_id` from the caller's token when the
/// body does not carry them.
pub(crate) fn stamp_audit(body: &mut Map<String, Value>, prefix: &str, user_id: i64, tz: FixedOffset) {
    let date_key = format!("{prefix}_date");
    if !body.contains_key(&date_key) {
        body.insert(date_key, json!(format_timestamp(Utc::now(), tz)));
    }
    let user_key = format!("{prefix}_user_id");
    if !body.contains_key(&user_key) {
        body.insert(user_key, json!(user_id));
    }
}

/// Lists always answer 200, even with zero matches.
pub(crate) fn respond_list(outcome: QueryOutcome) -> ApiResponse {
    ApiResponse::success(outcome.into_envelope(), 200)
}

/// A detail without a row is a 404.
pub(crate) fn respond_detail(outcome: QueryOutcome) -> Result<ApiResponse, AppError> {
    let envelope = outcome.into_envelope();
    if envelope.data.is_absent() {
        return Err(AppError::NotFoundData);
    }
    Ok(ApiResponse::success(envelope, 200))
}

/// A write that produced nothing (rejected, fault, or zero rows) is a 400
/// "Invalid Data".
pub(crate) fn respond_write(outcome: QueryOutcome, code: u16) -> Result<ApiResponse, AppError> {
    let envelope = outcome.into_envelope();
    if envelope.data.is_absent() {
        return Err(AppError::BadRequest("Invalid Data".into()));
    }
    Ok(ApiResponse::success(envelope, code))
}

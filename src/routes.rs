//! Route table: public token routes, guarded resource routes, root info,
//! fallback.

use crate::auth;
use crate::resource;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::extract::State;
use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

const BODY_LIMIT_BYTES: usize = 25 * 1024 * 1024;

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    Router::new()
        .route("/", get(info))
        .nest("/token", auth::handlers::routes())
        .nest("/users", resource::users::routes())
        .nest("/customers", resource::customers::routes())
        .nest("/cities", resource::cities::routes())
        .nest("/provinces", resource::provinces::routes())
        .nest("/product_categories", resource::product_categories::routes())
        .nest("/user_levels", resource::user_levels::routes())
        .fallback(fallback)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}

async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "app": state.config.app.name,
        "description": state.config.app.desc,
    }))
}

async fn fallback() -> ApiResponse {
    ApiResponse::not_found_resource()
}

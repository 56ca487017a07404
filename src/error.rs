//! Typed errors and HTTP mapping.
//!
//! The query core never surfaces these across its boundary (faults become the
//! zero-value envelope); `AppError` exists for the HTTP layer: auth failures,
//! malformed requests, and startup problems.

use crate::response::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("data not found")]
    NotFoundData,
    #[error("resource not found")]
    NotFoundResource,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("config: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self {
            AppError::BadRequest(msg) => ApiResponse::bad_request(Some(msg.clone())),
            AppError::Unauthorized => ApiResponse::unauthorized(None),
            AppError::Forbidden => ApiResponse::forbidden(),
            AppError::NotFoundData => ApiResponse::not_found_data(),
            AppError::NotFoundResource => ApiResponse::not_found_resource(),
            AppError::MethodNotAllowed => ApiResponse::method_not_allowed(),
            AppError::Config(e) => {
                tracing::error!(error = %e, "configuration error");
                ApiResponse::internal_server_error()
            }
            AppError::Db(e) => {
                tracing::error!(error = %e, "database error");
                ApiResponse::internal_server_error()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ApiResponse::internal_server_error()
            }
        };
        let status = StatusCode::from_u16(body.response_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

//! The uniform HTTP response body.
//!
//! Every endpoint, success or failure, answers with the same shape: a unix
//! request timestamp, the HTTP code mirrored in the body, a success flag, and
//! either the data payload with paging or a title/message pair.

use crate::service::{Envelope, Payload};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Paging {
    pub current: u64,
    pub next: u64,
    pub previous: u64,
    pub first: u64,
    pub last: u64,
}

impl Paging {
    /// Page links from the totals; only built when paging is active and
    /// something matched.
    fn from_envelope(envelope: &Envelope) -> Option<Self> {
        if envelope.limit == 0 || envelope.total_data == 0 {
            return None;
        }
        let last = envelope.total_data.div_ceil(envelope.limit).max(1);
        let current = envelope.page;
        Some(Paging {
            current,
            next: if current + 1 <= last { current + 1 } else { current },
            previous: if current > 1 { current - 1 } else { 1 },
            first: 1,
            last,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub request_time: i64,
    pub response_code: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_data: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    /// Success body from a result envelope. Only 200 and 201 are honored as
    /// override codes.
    pub fn success(envelope: Envelope, code: u16) -> Self {
        let paging = Paging::from_envelope(&envelope);
        ApiResponse {
            request_time: Utc::now().timestamp(),
            response_code: if code == 201 { 201 } else { 200 },
            success: true,
            total_data: Some(envelope.total_data),
            data: Some(envelope.data),
            paging,
            title: None,
            message: None,
        }
    }

    fn error(code: u16, title: &'static str, message: String) -> Self {
        ApiResponse {
            request_time: Utc::now().timestamp(),
            response_code: code,
            success: false,
            total_data: None,
            data: None,
            paging: None,
            title: Some(title),
            message: Some(message),
        }
    }

    pub fn bad_request(message: Option<String>) -> Self {
        Self::error(
            400,
            "Bad Request",
            message.unwrap_or_else(|| "Resource Not Found".into()),
        )
    }

    pub fn unauthorized(message: Option<String>) -> Self {
        Self::error(401, "Unauthorized", message.unwrap_or_else(|| "Unauthorized".into()))
    }

    pub fn forbidden() -> Self {
        Self::error(
            403,
            "Forbidden",
            "You do not have rights to access this resource".into(),
        )
    }

    pub fn not_found_data() -> Self {
        Self::error(404, "Not Found", "Data Not Found".into())
    }

    pub fn not_found_resource() -> Self {
        Self::error(404, "Not Found", "Resource Not Found".into())
    }

    pub fn method_not_allowed() -> Self {
        Self::error(
            405,
            "Method Not Allowed",
            "This resource is not match with your request method".into(),
        )
    }

    pub fn internal_server_error() -> Self {
        Self::error(
            500,
            "Internal Server Error",
            "The server encountered an error, please try again later".into(),
        )
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.response_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(total: u64, limit: u64, page: u64) -> Envelope {
        Envelope {
            total_data: total,
            limit,
            page,
            data: Payload::Rows(vec![]),
        }
    }

    #[test]
    fn paging_links_for_a_middle_page() {
        let paging = Paging::from_envelope(&envelope(25, 10, 2)).unwrap();
        assert_eq!(paging.current, 2);
        assert_eq!(paging.next, 3);
        assert_eq!(paging.previous, 1);
        assert_eq!(paging.first, 1);
        assert_eq!(paging.last, 3);
    }

    #[test]
    fn next_never_exceeds_last() {
        let paging = Paging::from_envelope(&envelope(25, 10, 3)).unwrap();
        assert_eq!(paging.next, 3);
        assert_eq!(paging.last, 3);
    }

    #[test]
    fn paging_is_omitted_without_limit_or_matches() {
        assert!(Paging::from_envelope(&envelope(25, 0, 1)).is_none());
        assert!(Paging::from_envelope(&envelope(0, 10, 1)).is_none());
    }

    #[test]
    fn success_honors_only_200_and_201() {
        assert_eq!(ApiResponse::success(envelope(0, 0, 1), 201).response_code, 201);
        assert_eq!(ApiResponse::success(envelope(0, 0, 1), 418).response_code, 200);
    }

    #[test]
    fn error_body_carries_title_and_message() {
        let body = serde_json::to_value(ApiResponse::not_found_data()).unwrap();
        assert_eq!(body["response_code"], json!(404));
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["title"], json!("Not Found"));
        assert_eq!(body["message"], json!("Data Not Found"));
        assert!(body.get("data").is_none());
    }
}

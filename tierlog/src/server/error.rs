//! Error responses for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;

/// Wrapper converting store errors into HTTP responses.
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "bad_data"),
            Error::InvalidRange { .. } => (StatusCode::BAD_REQUEST, "bad_data"),
            Error::CursorExpired => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            Error::HotTier(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            Error::ColdTier(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = serde_json::json!({
            "status": "error",
            "errorType": error_type,
            "error": self.0.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

//! HTTP error mapping
//!
//! Handlers return `Result<_, ApiError>`; this type maps the common error
//! enum onto status codes and a JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use lc_common::Error;

/// Error type returned by all HTTP handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::NotFound(msg) => ApiError::not_found(msg.clone()),
            Error::InvalidInput(msg) => ApiError::bad_request(msg.clone()),
            Error::Unauthorized(msg) => ApiError::unauthorized(msg.clone()),
            Error::Forbidden(msg) => ApiError::forbidden(msg.clone()),
            // Internal detail stays in the log, not the response body
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                error!("Internal error: {}", err);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

//! Route failures rendered in the shared error wire shape.
//!
//! Every handler returns `Result<_, AppError>`; the `IntoResponse` impl
//! turns the error into `{ "error": { code, message, details? } }` with the
//! status looked up from the code, so clients classify it as `http` and
//! can branch on `code`.

use std::fmt;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use endpoint_core::contract::errors::{ErrorCode, ErrorResponse};
use endpoint_core::ValidationError;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Map<String, Value>>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "Access denied")
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, message)
    }

    pub fn validation(message: impl Into<String>, details: Option<Map<String, Value>>) -> Self {
        Self {
            details,
            ..Self::new(ErrorCode::ValidationError, message)
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// An unexpected failure. The cause is logged here and never sent to
    /// the client.
    pub fn internal(cause: impl fmt::Display) -> Self {
        error!(%cause, "internal error");
        Self::new(ErrorCode::Internal, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn to_response(&self) -> ErrorResponse {
        let response = ErrorResponse::new(self.code, self.message.clone());
        match &self.details {
            Some(details) => response.with_details(details.clone()),
            None => response,
        }
    }
}

/// Schema rejections become `VALIDATION_ERROR` with one entry per issue.
impl From<ValidationError> for AppError {
    fn from(rejected: ValidationError) -> Self {
        let mut details = Map::new();
        details.insert("issues".to_string(), json!(rejected.issues));
        Self::validation("Invalid input", Some(details))
    }
}

/// Extractor failures keep the shared wire shape instead of axum's plain
/// text body.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        debug!(code = %self.code, message = %self.message, "request failed");
        (self.status(), Json(self.to_response())).into_response()
    }
}

//! Raising adapter: turns a [`ApiResult`] back into a plain error for
//! callers that prefer `?` on a single error type over matching kinds.

use thiserror::Error;

use crate::contract::errors::{ErrorCode, ErrorResponse};
use crate::error::{ApiError, ErrorKind};
use crate::result::ApiResult;

/// A classified failure, raised.
///
/// The message is the callee's own `error.message` when the response
/// carried a structured error body, and the classified error's message
/// otherwise.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    message: String,
    #[source]
    error: ApiError,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.error.code()
    }

    pub fn status(&self) -> Option<u16> {
        self.error.status()
    }

    pub fn error_response(&self) -> Option<ErrorResponse> {
        self.error.error_response()
    }

    pub fn api_error(&self) -> &ApiError {
        &self.error
    }

    pub fn into_inner(self) -> ApiError {
        self.error
    }
}

impl From<ApiError> for ClientError {
    fn from(error: ApiError) -> Self {
        let message = error
            .error_response()
            .map(|response| response.error.message)
            .unwrap_or_else(|| error.to_string());
        Self { message, error }
    }
}

/// `Ok` passes through; `Err` becomes a [`ClientError`].
pub fn raise<T>(result: ApiResult<T>) -> Result<T, ClientError> {
    result.map_err(ClientError::from)
}

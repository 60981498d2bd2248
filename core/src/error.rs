//! Error types for the invocation runtime.
//!
//! # Design
//! Two layers. [`CallError`] is what the invocation core raises: it keeps
//! the original failure (validation issues, transport signal, decode
//! error) untouched. [`ApiError`] is the closed five-kind taxonomy callers
//! branch on; the classifier is the only producer of it. Callers never
//! need to match on message text: `kind()` and, for `http`, `code()` are
//! enough.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::contract::errors::{ErrorCode, ErrorResponse};
use crate::http::TransportError;
use crate::method::HttpMethod;
use crate::schema::{summarize, Issue, ValidationError};

/// Which caller-supplied input failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InputPart {
    #[strum(serialize = "path parameters")]
    PathParams,
    #[strum(serialize = "query")]
    Query,
    #[strum(serialize = "request body")]
    Body,
}

/// A failure raised by the invocation core, before classification.
#[derive(Debug, Error)]
pub enum CallError {
    /// Path parameters, query or body rejected by the descriptor's schema.
    /// Raised before any transport call is issued.
    #[error("invalid {part}: {source}")]
    InvalidInput {
        part: InputPart,
        source: ValidationError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A 2xx response whose body is not JSON at all.
    #[error("response body is not JSON: {0}")]
    Decode(#[source] serde_json::Error),

    /// A JSON response rejected by the descriptor's response schema.
    #[error("response rejected: {0}")]
    InvalidResponse(#[source] ValidationError),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Diagnostic tag attached to a classified failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorContext {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            path: Some(path.into()),
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.method, &self.path) {
            (Some(method), Some(path)) => write!(f, "{method} {path}"),
            (Some(method), None) => write!(f, "{method}"),
            (None, Some(path)) => write!(f, "{path}"),
            (None, None) => Ok(()),
        }
    }
}

/// The body of an error response, decoded as far as its content type
/// allows.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// The original failure behind an `unknown` classification, kept verbatim.
#[derive(Clone)]
pub struct Cause(Arc<dyn std::error::Error + Send + Sync>);

impl Cause {
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(Arc::from(error.into()))
    }

    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for Cause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Discriminant of [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Http,
    Timeout,
    Network,
    InvalidResponse,
    Unknown,
}

/// Every way a call across the process boundary can fail.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The callee answered with a non-2xx status.
    #[error("HTTP {status} {status_text}")]
    Http {
        status: u16,
        status_text: String,
        body: Option<ResponseBody>,
        context: Option<ErrorContext>,
    },

    /// The transport's deadline elapsed.
    #[error("request timed out")]
    Timeout { context: Option<ErrorContext> },

    /// Connectivity failed before any response.
    #[error("network error: {message}")]
    Network {
        message: String,
        context: Option<ErrorContext>,
    },

    /// A value failed its descriptor schema.
    #[error("invalid response: {}", summarize(.issues))]
    InvalidResponse {
        issues: Vec<Issue>,
        context: Option<ErrorContext>,
    },

    /// Anything else.
    #[error("unknown error: {error}")]
    Unknown {
        #[source]
        error: Cause,
        context: Option<ErrorContext>,
    },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { .. } => ErrorKind::Http,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network { .. } => ErrorKind::Network,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Http { context, .. }
            | Self::Timeout { context }
            | Self::Network { context, .. }
            | Self::InvalidResponse { context, .. }
            | Self::Unknown { context, .. } => context.as_ref(),
        }
    }

    /// HTTP status, for the `http` kind.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The callee's structured error body, when the `http` body is one.
    pub fn error_response(&self) -> Option<ErrorResponse> {
        let Self::Http { body: Some(body), .. } = self else {
            return None;
        };
        let json = body.as_json()?;
        serde_json::from_value(json.clone()).ok()
    }

    /// The wire error code, when the `http` body carries one.
    pub fn code(&self) -> Option<ErrorCode> {
        self.error_response().map(|r| r.error.code)
    }
}

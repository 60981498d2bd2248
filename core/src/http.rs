//! HTTP transport boundary.
//!
//! # Design
//! The core never opens a socket. It builds an `HttpRequest` as plain data
//! and hands it to an injected [`Transport`], which owns everything about
//! the actual round trip: base-URL prefixing, auth headers, default
//! timeout and retries. The transport reports back either the final
//! `HttpResponse` or one of the `TransportError` signals the error
//! classifier understands.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::method::HttpMethod;

/// An HTTP request described as plain data.
///
/// `path` is relative (no leading `/`) so it composes with whatever base
/// URL the transport is configured with. `query` and `body` carry values
/// that have already passed the descriptor's schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Option<Value>,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Flatten the query value into `(key, value)` pairs.
    ///
    /// Nulls are skipped, arrays repeat their key, strings are passed as-is
    /// and every other scalar uses its JSON text.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(Value::Object(map)) = &self.query else {
            return Vec::new();
        };
        let mut pairs = Vec::new();
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar_text(item) {
                            pairs.push((key.clone(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
        }
        pairs
    }
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup; returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the declared content type is JSON.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// The signals a transport may reject with.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The callee answered with a non-2xx status.
    #[error("HTTP {}: {}", .0.status, .0.status_text)]
    Status(HttpResponse),

    /// The transport's deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled by its caller.
    #[error("request aborted")]
    Aborted,

    /// Connectivity failed before any response (refused, DNS, reset).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Anything else the transport could not express above.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Performs one HTTP round trip.
///
/// Implementations must answer with `Ok` for every response they receive,
/// whatever the status, or report a `TransportError` when none was
/// received. The invocation core treats a non-2xx `Ok` the same as
/// `TransportError::Status`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

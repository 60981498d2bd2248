//! Error classifier: any failure in, exactly one [`ApiError`] out.
//!
//! # Design
//! Classification is a total, pure function. It never fails and never
//! panics; whatever it cannot recognize lands in `unknown` with the
//! original error kept as the cause. Match order matters:
//!
//! 1. transport status error -> `http` (body read as JSON or text)
//! 2. transport deadline -> `timeout`
//! 3. transport abort -> `unknown` (aborts are not part of the taxonomy)
//! 4. schema rejection -> `invalid_response`, with every issue
//! 5. connectivity failure before a response -> `network`
//! 6. anything else -> `unknown`
//!
//! The caller's context is attached to every kind as given.

use std::io;

use crate::error::{ApiError, CallError, Cause, ErrorContext, ResponseBody};
use crate::http::{HttpResponse, TransportError};
use crate::schema::ValidationError;

/// Failures the classifier understands.
pub trait Classify {
    fn classify(self, context: Option<ErrorContext>) -> ApiError;
}

/// Classify `error`, attaching `context`.
pub fn classify(error: impl Classify, context: Option<ErrorContext>) -> ApiError {
    error.classify(context)
}

impl Classify for CallError {
    fn classify(self, context: Option<ErrorContext>) -> ApiError {
        match self {
            CallError::Transport(TransportError::Status(response)) => http_error(&response, context),
            CallError::Transport(TransportError::Timeout) => ApiError::Timeout { context },
            CallError::Transport(TransportError::Aborted) => ApiError::Unknown {
                error: Cause::new(TransportError::Aborted),
                context,
            },
            CallError::InvalidResponse(rejected) | CallError::InvalidInput { source: rejected, .. } => {
                ApiError::InvalidResponse {
                    issues: rejected.issues,
                    context,
                }
            }
            CallError::Transport(TransportError::Connect(message)) => ApiError::Network { message, context },
            CallError::Transport(TransportError::Other(error)) | CallError::Other(error) => ApiError::Unknown {
                error: Cause::new(error),
                context,
            },
            decode @ CallError::Decode(_) => ApiError::Unknown {
                error: Cause::new(decode),
                context,
            },
        }
    }
}

impl Classify for TransportError {
    fn classify(self, context: Option<ErrorContext>) -> ApiError {
        CallError::Transport(self).classify(context)
    }
}

impl Classify for ValidationError {
    fn classify(self, context: Option<ErrorContext>) -> ApiError {
        CallError::InvalidResponse(self).classify(context)
    }
}

/// Already classified; only the context is replaced when one is given.
impl Classify for ApiError {
    fn classify(mut self, context: Option<ErrorContext>) -> ApiError {
        if context.is_some() {
            match &mut self {
                ApiError::Http { context: slot, .. }
                | ApiError::Timeout { context: slot }
                | ApiError::Network { context: slot, .. }
                | ApiError::InvalidResponse { context: slot, .. }
                | ApiError::Unknown { context: slot, .. } => *slot = context,
            }
        }
        self
    }
}

/// Socket-level errors: deadline kinds are timeouts, connection kinds are
/// network failures, the rest is unknown.
impl Classify for io::Error {
    fn classify(self, context: Option<ErrorContext>) -> ApiError {
        match self.kind() {
            io::ErrorKind::TimedOut => ApiError::Timeout { context },
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe => ApiError::Network {
                message: self.to_string(),
                context,
            },
            _ => ApiError::Unknown {
                error: Cause::new(self),
                context,
            },
        }
    }
}

/// Type-erased errors are recognized by downcasting before falling back
/// to `unknown`.
impl Classify for Box<dyn std::error::Error + Send + Sync> {
    fn classify(self, context: Option<ErrorContext>) -> ApiError {
        let error = match self.downcast::<CallError>() {
            Ok(call) => return (*call).classify(context),
            Err(error) => error,
        };
        let error = match error.downcast::<TransportError>() {
            Ok(transport) => return (*transport).classify(context),
            Err(error) => error,
        };
        let error = match error.downcast::<ValidationError>() {
            Ok(rejected) => return (*rejected).classify(context),
            Err(error) => error,
        };
        let error = match error.downcast::<ApiError>() {
            Ok(api) => return (*api).classify(context),
            Err(error) => error,
        };
        match error.downcast::<io::Error>() {
            Ok(io) => (*io).classify(context),
            Err(error) => ApiError::Unknown {
                error: Cause::new(error),
                context,
            },
        }
    }
}

impl From<CallError> for ApiError {
    fn from(error: CallError) -> Self {
        error.classify(None)
    }
}

fn http_error(response: &HttpResponse, context: Option<ErrorContext>) -> ApiError {
    ApiError::Http {
        status: response.status,
        status_text: response.status_text.clone(),
        body: read_body(response),
        context,
    }
}

/// JSON when the content type says so, text otherwise. A JSON body that
/// does not parse is dropped rather than raised.
fn read_body(response: &HttpResponse) -> Option<ResponseBody> {
    if response.is_json() {
        response.json().ok().map(ResponseBody::Json)
    } else {
        Some(ResponseBody::Text(response.body.clone()))
    }
}

//! Result wrapper: run a call, never let a failure escape.
//!
//! [`to_result`] awaits a fallible call and hands back either the data or
//! a classified [`ApiError`]. A panic inside the call is caught and
//! classified as `unknown` too, so the wrapper itself never fails.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use thiserror::Error;
use tracing::warn;

use crate::classify::{classify, Classify};
use crate::error::{ApiError, Cause, ErrorContext};

pub type ApiResult<T> = Result<T, ApiError>;

/// A call that panicked instead of returning.
#[derive(Debug, Error)]
#[error("call panicked: {message}")]
pub struct Panicked {
    pub message: String,
}

impl Panicked {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        Self { message }
    }
}

/// Await `call`; classify any failure with `context` attached.
pub async fn to_result<T, E, F>(call: F, context: Option<ErrorContext>) -> ApiResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Classify,
{
    let error = match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(data)) => return Ok(data),
        Ok(Err(error)) => classify(error, context),
        Err(payload) => ApiError::Unknown {
            error: Cause::new(Panicked::from_payload(payload)),
            context,
        },
    };
    match error.context() {
        Some(context) => warn!(kind = %error.kind(), %context, "call failed: {error}"),
        None => warn!(kind = %error.kind(), "call failed: {error}"),
    }
    Err(error)
}

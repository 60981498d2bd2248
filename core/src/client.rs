//! Invocation core: three calling conventions over an injected transport.
//!
//! # Design
//! `ApiClient` holds only its transport handle and carries no mutable
//! state between calls, so one client can serve any number of concurrent
//! calls. Every call is the same pipeline:
//!
//! 1. prepare the path and query from the descriptor (and, for body
//!    descriptors, validate the body) -- nothing is sent if this fails,
//! 2. one transport round trip,
//! 3. non-2xx is a status error; otherwise the body is parsed as JSON and
//!    must pass the descriptor's response schema before it is returned.
//!
//! The `call_*` methods return the raw [`CallError`]. `get`, `send` and
//! `send_empty` wrap the same calls with [`to_result`], tagging failures
//! with the method and resolved path.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::endpoint::{BodyEndpoint, Endpoint, GetEndpoint, NoBodyEndpoint};
use crate::error::{CallError, ErrorContext, InputPart};
use crate::http::{HttpRequest, Transport, TransportError};
use crate::method::HttpMethod;
use crate::prepare::{prepare, validate_into_value, Params, PreparedRequest};
use crate::result::{to_result, ApiResult};
use crate::schema::Schema;

/// Typed client for endpoint descriptors.
#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Query-only call (GET).
    pub async fn call_get<P, Q, R>(&self, endpoint: &GetEndpoint<P, Q, R>, params: &Params) -> Result<R::Output, CallError>
    where
        P: Schema,
        P::Output: Serialize,
        Q: Schema,
        Q::Output: Serialize,
        R: Schema,
    {
        self.dispatch(endpoint, prepare(endpoint, params), || Ok(None)).await
    }

    /// Body-bearing call (POST / PUT / PATCH). The body is validated
    /// against the request schema before anything is sent.
    pub async fn call_body<B, P, Q, R>(
        &self,
        endpoint: &BodyEndpoint<B, P, Q, R>,
        body: &(impl Serialize + ?Sized),
        params: &Params,
    ) -> Result<R::Output, CallError>
    where
        B: Schema,
        B::Output: Serialize,
        P: Schema,
        P::Output: Serialize,
        Q: Schema,
        Q::Output: Serialize,
        R: Schema,
    {
        let prepared = prepare(endpoint, params);
        self.dispatch(endpoint, prepared, || validated_body(endpoint, body).map(Some))
            .await
    }

    /// No-body call (DELETE / HEAD).
    pub async fn call_no_body<P, Q, R>(
        &self,
        endpoint: &NoBodyEndpoint<P, Q, R>,
        params: &Params,
    ) -> Result<R::Output, CallError>
    where
        P: Schema,
        P::Output: Serialize,
        Q: Schema,
        Q::Output: Serialize,
        R: Schema,
    {
        self.dispatch(endpoint, prepare(endpoint, params), || Ok(None)).await
    }

    /// [`call_get`](Self::call_get), with every failure classified.
    pub async fn get<P, Q, R>(&self, endpoint: &GetEndpoint<P, Q, R>, params: &Params) -> ApiResult<R::Output>
    where
        P: Schema,
        P::Output: Serialize,
        Q: Schema,
        Q::Output: Serialize,
        R: Schema,
    {
        let prepared = prepare(endpoint, params);
        let context = context_for(endpoint, &prepared);
        to_result(self.dispatch(endpoint, prepared, || Ok(None)), Some(context)).await
    }

    /// [`call_body`](Self::call_body), with every failure classified.
    pub async fn send<B, P, Q, R>(
        &self,
        endpoint: &BodyEndpoint<B, P, Q, R>,
        body: &(impl Serialize + ?Sized),
        params: &Params,
    ) -> ApiResult<R::Output>
    where
        B: Schema,
        B::Output: Serialize,
        P: Schema,
        P::Output: Serialize,
        Q: Schema,
        Q::Output: Serialize,
        R: Schema,
    {
        let prepared = prepare(endpoint, params);
        let context = context_for(endpoint, &prepared);
        let call = self.dispatch(endpoint, prepared, || validated_body(endpoint, body).map(Some));
        to_result(call, Some(context)).await
    }

    /// [`call_no_body`](Self::call_no_body), with every failure classified.
    pub async fn send_empty<P, Q, R>(&self, endpoint: &NoBodyEndpoint<P, Q, R>, params: &Params) -> ApiResult<R::Output>
    where
        P: Schema,
        P::Output: Serialize,
        Q: Schema,
        Q::Output: Serialize,
        R: Schema,
    {
        let prepared = prepare(endpoint, params);
        let context = context_for(endpoint, &prepared);
        to_result(self.dispatch(endpoint, prepared, || Ok(None)), Some(context)).await
    }

    /// Stops at the first failed input check (path and query, then body)
    /// before anything is sent.
    #[instrument(name = "api_call", skip_all, fields(http.method = %endpoint.method(), http.path = endpoint.path()))]
    async fn dispatch<C, P, Q, R: Schema>(
        &self,
        endpoint: &Endpoint<C, P, Q, R>,
        prepared: Result<PreparedRequest, CallError>,
        body: impl FnOnce() -> Result<Option<Value>, CallError>,
    ) -> Result<R::Output, CallError> {
        let prepared = prepared?;
        let body = body()?;
        self.execute(endpoint.method(), prepared, body, endpoint.response()).await
    }

    async fn execute<R: Schema>(
        &self,
        method: HttpMethod,
        prepared: PreparedRequest,
        body: Option<Value>,
        response_schema: &R,
    ) -> Result<R::Output, CallError> {
        let request = HttpRequest {
            method,
            path: prepared.path,
            query: prepared.query,
            body,
        };
        let response = self.transport.send(request).await?;
        debug!(status = response.status, "response received");

        if !response.is_success() {
            return Err(TransportError::Status(response).into());
        }
        let json = parse_body(&response.body)?;
        response_schema.validate(&json).map_err(CallError::InvalidResponse)
    }
}

fn validated_body<B, P, Q, R>(endpoint: &BodyEndpoint<B, P, Q, R>, body: &(impl Serialize + ?Sized)) -> Result<Value, CallError>
where
    B: Schema,
    B::Output: Serialize,
{
    let raw = serde_json::to_value(body).map_err(|e| CallError::Other(Box::new(e)))?;
    validate_into_value(endpoint.request(), &raw, InputPart::Body)
}

/// An empty body reads as `null`, so schemas decide whether "nothing" is
/// an acceptable answer.
fn parse_body(body: &str) -> Result<Value, CallError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(CallError::Decode)
}

/// Method and resolved path for diagnostics; the template when the path
/// could not be resolved.
fn context_for<C, P, Q, R>(endpoint: &Endpoint<C, P, Q, R>, prepared: &Result<PreparedRequest, CallError>) -> ErrorContext {
    let path = match prepared {
        Ok(prepared) => format!("/{}", prepared.path),
        Err(_) => endpoint.path().to_string(),
    };
    ErrorContext::new(endpoint.method(), path)
}

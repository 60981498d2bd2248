//! Typed endpoint contracts and a client runtime that never lets a
//! failure escape unclassified.
//!
//! # Overview
//! An endpoint is described once, as data: method, path template and the
//! schemas for path parameters, query, request body and response. The
//! server validates against the same descriptors the client calls with,
//! so both sides share one contract.
//!
//! # Design
//! - Descriptors ([`Endpoint`]) are immutable values built once; the
//!   calling convention (query-only, body, no-body) is part of the type.
//! - The client is stateless and does no I/O of its own: the caller
//!   injects a [`Transport`] that performs the round trip.
//! - Every failure maps to exactly one [`ErrorKind`]. [`ApiClient::get`]
//!   and friends return [`ApiResult`]; [`raise`] turns that back into a
//!   plain `Result<T, ClientError>`.

pub mod api;
pub mod classify;
pub mod client;
pub mod contract;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod method;
pub mod prepare;
pub mod raise;
pub mod result;
pub mod schema;

pub use classify::{classify, Classify};
pub use client::ApiClient;
pub use endpoint::{BodyEndpoint, DescriptorError, Endpoint, GetEndpoint, NoBodyEndpoint};
pub use error::{ApiError, CallError, ErrorContext, ErrorKind, ResponseBody};
pub use http::{HttpRequest, HttpResponse, Transport, TransportError};
pub use method::HttpMethod;
pub use prepare::{prepare, Params, PreparedRequest};
pub use raise::{raise, ClientError};
pub use result::{to_result, ApiResult};
pub use schema::{Issue, Schema, Typed, ValidationError};

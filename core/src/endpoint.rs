//! Endpoint descriptors: the contract both sides of an API compile against.
//!
//! # Design
//! A descriptor names one operation: its method, its path template and the
//! schemas for path parameters, query, request body and response. The
//! calling convention is part of the type (`C`):
//!
//! - [`QueryOnly`] for GET,
//! - [`WithBody`] for POST / PUT / PATCH, which is the only convention that
//!   holds a request schema,
//! - [`NoBody`] for DELETE / HEAD.
//!
//! so "a request schema is present iff the method carries a body" cannot be
//! violated. The remaining invariant, that the template's placeholders are
//! exactly the keys of the path-parameter schema, is checked once when the
//! descriptor is built. Descriptors are built at startup, never mutated,
//! and shared by reference from then on.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::method::HttpMethod;
use crate::schema::{NoSchema, PathSchema, Schema};

/// Calling convention of GET descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOnly;

/// Calling convention of POST / PUT / PATCH descriptors; holds the request
/// body schema.
#[derive(Debug, Clone, Copy)]
pub struct WithBody<B>(B);

/// Calling convention of DELETE / HEAD descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBody;

/// An immutable description of one API operation.
#[derive(Debug)]
pub struct Endpoint<C, P, Q, R> {
    method: HttpMethod,
    path: &'static str,
    path_params: Option<P>,
    query: Option<Q>,
    convention: C,
    response: R,
}

pub type GetEndpoint<P, Q, R> = Endpoint<QueryOnly, P, Q, R>;
pub type BodyEndpoint<B, P, Q, R> = Endpoint<WithBody<B>, P, Q, R>;
pub type NoBodyEndpoint<P, Q, R> = Endpoint<NoBody, P, Q, R>;

/// A descriptor whose template does not match its path-parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("`{template}` has placeholders {placeholders:?} but no path parameter schema")]
    MissingPathSchema {
        template: &'static str,
        placeholders: Vec<String>,
    },

    #[error("`{template}` has no placeholders but declares a path parameter schema")]
    UnexpectedPathSchema { template: &'static str },

    #[error("`{template}` placeholders {placeholders:?} do not match schema keys {keys:?}")]
    PlaceholderMismatch {
        template: &'static str,
        placeholders: Vec<String>,
        keys: Vec<String>,
    },

    #[error("`{template}` repeats placeholder `:{name}`")]
    DuplicatePlaceholder { template: &'static str, name: String },
}

impl<C, P, Q, R> Endpoint<C, P, Q, R> {
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The path template, e.g. `/users/:id`.
    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn path_params(&self) -> Option<&P> {
        self.path_params.as_ref()
    }

    pub fn query(&self) -> Option<&Q> {
        self.query.as_ref()
    }

    pub fn response(&self) -> &R {
        &self.response
    }
}

impl<B, P, Q, R> Endpoint<WithBody<B>, P, Q, R> {
    pub fn request(&self) -> &B {
        &self.convention.0
    }
}

impl<R: Schema> Endpoint<QueryOnly, NoSchema, NoSchema, R> {
    pub fn get(path: &'static str, response: R) -> EndpointBuilder<QueryOnly, NoSchema, NoSchema, R> {
        EndpointBuilder::new(HttpMethod::Get, path, QueryOnly, response)
    }
}

impl<B: Schema, R: Schema> Endpoint<WithBody<B>, NoSchema, NoSchema, R> {
    pub fn post(path: &'static str, request: B, response: R) -> EndpointBuilder<WithBody<B>, NoSchema, NoSchema, R> {
        EndpointBuilder::new(HttpMethod::Post, path, WithBody(request), response)
    }

    pub fn put(path: &'static str, request: B, response: R) -> EndpointBuilder<WithBody<B>, NoSchema, NoSchema, R> {
        EndpointBuilder::new(HttpMethod::Put, path, WithBody(request), response)
    }

    pub fn patch(path: &'static str, request: B, response: R) -> EndpointBuilder<WithBody<B>, NoSchema, NoSchema, R> {
        EndpointBuilder::new(HttpMethod::Patch, path, WithBody(request), response)
    }
}

impl<R: Schema> Endpoint<NoBody, NoSchema, NoSchema, R> {
    pub fn delete(path: &'static str, response: R) -> EndpointBuilder<NoBody, NoSchema, NoSchema, R> {
        EndpointBuilder::new(HttpMethod::Delete, path, NoBody, response)
    }

    pub fn head(path: &'static str, response: R) -> EndpointBuilder<NoBody, NoSchema, NoSchema, R> {
        EndpointBuilder::new(HttpMethod::Head, path, NoBody, response)
    }
}

/// Assembles an [`Endpoint`]; obtained from `Endpoint::get`, `post`, etc.
#[derive(Debug)]
pub struct EndpointBuilder<C, P, Q, R> {
    inner: Endpoint<C, P, Q, R>,
}

impl<C, R> EndpointBuilder<C, NoSchema, NoSchema, R> {
    fn new(method: HttpMethod, path: &'static str, convention: C, response: R) -> Self {
        Self {
            inner: Endpoint {
                method,
                path,
                path_params: None,
                query: None,
                convention,
                response,
            },
        }
    }
}

impl<C, P, Q, R> EndpointBuilder<C, P, Q, R> {
    pub fn path_params<P2: PathSchema>(self, schema: P2) -> EndpointBuilder<C, P2, Q, R> {
        let e = self.inner;
        EndpointBuilder {
            inner: Endpoint {
                method: e.method,
                path: e.path,
                path_params: Some(schema),
                query: e.query,
                convention: e.convention,
                response: e.response,
            },
        }
    }

    pub fn query<Q2: Schema>(self, schema: Q2) -> EndpointBuilder<C, P, Q2, R> {
        let e = self.inner;
        EndpointBuilder {
            inner: Endpoint {
                method: e.method,
                path: e.path,
                path_params: e.path_params,
                query: Some(schema),
                convention: e.convention,
                response: e.response,
            },
        }
    }
}

impl<C, P: PathSchema, Q, R> EndpointBuilder<C, P, Q, R> {
    /// Finish the descriptor, checking the template against the path
    /// parameter schema.
    pub fn try_build(self) -> Result<Endpoint<C, P, Q, R>, DescriptorError> {
        check_placeholders(self.inner.path, self.inner.path_params.as_ref().map(|p| p.keys()))?;
        Ok(self.inner)
    }

    /// Finish the descriptor.
    ///
    /// # Panics
    /// When the template's placeholders differ from the path-parameter
    /// schema's keys. Descriptors are static declarations, so this is a
    /// programming error surfaced at startup.
    pub fn build(self) -> Endpoint<C, P, Q, R> {
        match self.try_build() {
            Ok(endpoint) => endpoint,
            Err(err) => panic!("invalid endpoint descriptor: {err}"),
        }
    }
}

/// Placeholder names of a template, in order of appearance. A placeholder
/// is a whole segment of the form `:name`.
pub fn placeholders(template: &str) -> Vec<&str> {
    template
        .split('/')
        .filter_map(|segment| segment.strip_prefix(':'))
        .filter(|name| !name.is_empty())
        .collect()
}

fn check_placeholders(template: &'static str, keys: Option<&[&'static str]>) -> Result<(), DescriptorError> {
    let found = placeholders(template);
    let mut unique = BTreeSet::new();
    for name in &found {
        if !unique.insert(*name) {
            return Err(DescriptorError::DuplicatePlaceholder {
                template,
                name: (*name).to_string(),
            });
        }
    }

    match keys {
        None if unique.is_empty() => Ok(()),
        None => Err(DescriptorError::MissingPathSchema {
            template,
            placeholders: unique.iter().map(|s| s.to_string()).collect(),
        }),
        Some(_) if unique.is_empty() => Err(DescriptorError::UnexpectedPathSchema { template }),
        Some(keys) => {
            let keys: BTreeSet<&str> = keys.iter().copied().collect();
            if keys == unique {
                Ok(())
            } else {
                Err(DescriptorError::PlaceholderMismatch {
                    template,
                    placeholders: unique.iter().map(|s| s.to_string()).collect(),
                    keys: keys.iter().map(|s| s.to_string()).collect(),
                })
            }
        }
    }
}

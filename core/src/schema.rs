//! Validators: the capability every descriptor schema provides.
//!
//! # Design
//! A [`Schema`] takes an untrusted JSON value and either accepts it,
//! possibly coercing it into a typed output, or reports every problem it
//! found as a list of [`Issue`]s. The invocation core depends only on this
//! trait. [`Typed`] is the stock implementation: serde decides the shape,
//! then [`Refine`] adds the value-level checks serde cannot express
//! (non-empty strings, e-mail syntax, ranges).

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_path_to_error::Segment;
use thiserror::Error;
use validator::ValidateEmail;

/// One problem found while validating a value.
///
/// `path` is the dotted location inside the value (`"items.0.email"`);
/// the empty string denotes the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn root(message: impl Into<String>) -> Self {
        Self::new("", message)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A rejected value, with every issue found (not just the first).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

pub(crate) fn summarize(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Issue> for ValidationError {
    fn from(issue: Issue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

impl From<Vec<Issue>> for ValidationError {
    fn from(issues: Vec<Issue>) -> Self {
        Self { issues }
    }
}

/// Checks an untrusted value against a shape.
pub trait Schema: Send + Sync {
    type Output;

    fn validate(&self, input: &Value) -> Result<Self::Output, ValidationError>;
}

/// A schema for path parameters. `keys` must name exactly the
/// placeholders of the template it is attached to.
pub trait PathSchema: Schema {
    fn keys(&self) -> &[&'static str];
}

/// Stand-in type for a schema slot a descriptor leaves empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl Schema for NoSchema {
    type Output = Value;

    fn validate(&self, input: &Value) -> Result<Value, ValidationError> {
        Ok(input.clone())
    }
}

impl PathSchema for NoSchema {
    fn keys(&self) -> &[&'static str] {
        &[]
    }
}

/// Collects issues while walking a decoded value.
#[derive(Debug, Default)]
pub struct Issues {
    prefix: Vec<String>,
    issues: Vec<Issue>,
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem with `field` under the current prefix. An empty
    /// field addresses the current value.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        let mut segments = self.prefix.clone();
        if !field.is_empty() {
            segments.push(field.to_string());
        }
        self.issues.push(Issue::new(segments.join("."), message));
    }

    /// Record `message` unless `ok` holds.
    pub fn ensure(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.push(field, message);
        }
    }

    /// Run `f` with `segment` appended to the prefix.
    pub fn nested(&mut self, segment: impl ToString, f: impl FnOnce(&mut Self)) {
        self.prefix.push(segment.to_string());
        f(self);
        self.prefix.pop();
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                issues: self.issues,
            })
        }
    }
}

/// Value-level checks run after a successful decode.
pub trait Refine {
    fn refine(&self, _issues: &mut Issues) {}
}

impl Refine for Value {}
impl Refine for String {}
impl Refine for bool {}

impl<T: Refine> Refine for Vec<T> {
    fn refine(&self, issues: &mut Issues) {
        for (index, item) in self.iter().enumerate() {
            issues.nested(index, |issues| item.refine(issues));
        }
    }
}

impl<T: Refine> Refine for Option<T> {
    fn refine(&self, issues: &mut Issues) {
        if let Some(inner) = self {
            inner.refine(issues);
        }
    }
}

/// Typed path parameters: the struct's field names are the template's
/// placeholder names.
pub trait PathParams: DeserializeOwned {
    const KEYS: &'static [&'static str];
}

/// Serde-backed schema: decode into `T`, then run `T`'s refinements.
pub struct Typed<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Typed<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned + Refine> Schema for Typed<T> {
    type Output = T;

    fn validate(&self, input: &Value) -> Result<T, ValidationError> {
        let Decoded {
            value,
            mut issues,
            replaced,
        } = decode::<T>(input);
        let Some(value) = value else {
            return Err(issues.into());
        };

        let mut refined = Issues::new();
        value.refine(&mut refined);
        // Stand-in values say nothing about the input.
        issues.extend(
            refined
                .issues
                .into_iter()
                .filter(|issue| !replaced.iter().any(|path| covers(path, &issue.path))),
        );
        if issues.is_empty() {
            Ok(value)
        } else {
            Err(issues.into())
        }
    }
}

impl<T: PathParams + Refine> PathSchema for Typed<T> {
    fn keys(&self) -> &[&'static str] {
        T::KEYS
    }
}

/// Upper bound on decode issues collected for one value.
const MAX_DECODE_ISSUES: usize = 64;

struct Decoded<T> {
    value: Option<T>,
    issues: Vec<Issue>,
    /// Dotted paths of members swapped for stand-ins.
    replaced: Vec<String>,
}

/// Decode `input` as `T`, reporting each failing object member at its own
/// path.
///
/// serde stops at the first failure, so a failing member is swapped for a
/// stand-in of another JSON kind and decoding resumes. A member no stand-in
/// satisfies ends the walk with `value: None`.
fn decode<T: DeserializeOwned>(input: &Value) -> Decoded<T> {
    let mut current = Cow::Borrowed(input);
    let mut decoded = Decoded {
        value: None,
        issues: Vec::new(),
        replaced: Vec::new(),
    };

    while decoded.issues.len() < MAX_DECODE_ISSUES {
        let err = match serde_path_to_error::deserialize::<_, T>(&*current) {
            Ok(value) => {
                decoded.value = Some(value);
                break;
            }
            Err(err) => err,
        };
        let path = segments(err.path());
        decoded.issues.push(Issue::new(path.join("."), err.inner().to_string()));

        match with_stand_in::<T>(&current, &path) {
            Some(next) => {
                decoded.replaced.push(path.join("."));
                current = Cow::Owned(next);
            }
            None => break,
        }
    }
    decoded
}

fn segments(path: &serde_path_to_error::Path) -> Vec<String> {
    path.iter()
        .map(|segment| match segment {
            Segment::Seq { index } => index.to_string(),
            Segment::Map { key } => key.clone(),
            Segment::Enum { variant } => variant.clone(),
            Segment::Unknown => "?".to_string(),
        })
        .collect()
}

/// A copy of `value` with the object member at `path` replaced, such that
/// decoding gets past that member. `None` when the path does not end in an
/// object member or nothing works.
fn with_stand_in<T: DeserializeOwned>(value: &Value, path: &[String]) -> Option<Value> {
    let stand_ins = [json!(""), json!(0), json!(false), json!([]), json!({}), Value::Null];
    stand_ins.into_iter().find_map(|stand_in| {
        let mut candidate = value.clone();
        *member_mut(&mut candidate, path)? = stand_in;
        match serde_path_to_error::deserialize::<_, T>(&candidate) {
            Ok(_) => Some(candidate),
            Err(err) if !segments(err.path()).starts_with(path) => Some(candidate),
            Err(_) => None,
        }
    })
}

fn member_mut<'a>(value: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let (last, parents) = path.split_last()?;
    let mut parent = value;
    for segment in parents {
        parent = match parent {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    parent.as_object_mut()?.get_mut(last)
}

/// `path` is `issue_path` or one of its ancestors.
fn covers(path: &str, issue_path: &str) -> bool {
    issue_path
        .strip_prefix(path)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// E-mail syntax as browsers and most form validators accept it: the
/// `validator` check, plus no dot at either end of the local part or
/// doubled inside it, and an alphabetic top-level domain of two or more
/// letters.
pub fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };
    let Some((_, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    s.validate_email()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

//! Request preparation: descriptor + caller parameters -> concrete path and
//! validated query.
//!
//! Pure functions, no I/O. Validation failures come back as
//! [`CallError::InvalidInput`] for the caller's error path to classify.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::endpoint::Endpoint;
use crate::error::{CallError, InputPart};
use crate::schema::{Issue, Schema, ValidationError};

/// Everything outside the unreserved set of RFC 3986, so `/`, `?`, `#`,
/// `:` and `%` inside a value cannot change routing.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Caller-supplied, not yet validated parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pub path_params: Option<Value>,
    pub query: Option<Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path_params: Value) -> Self {
        self.path_params = Some(path_params);
        self
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }
}

/// A resolved path (relative, no leading `/`) plus the validated query.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub path: String,
    pub query: Option<Value>,
}

/// Resolve `endpoint`'s template with `params`.
///
/// Path parameters and query are validated only when the descriptor
/// declares a schema for them and the caller supplied a value.
pub fn prepare<C, P, Q, R>(endpoint: &Endpoint<C, P, Q, R>, params: &Params) -> Result<PreparedRequest, CallError>
where
    P: Schema,
    P::Output: Serialize,
    Q: Schema,
    Q::Output: Serialize,
{
    let mut path = endpoint.path().to_string();

    if let (Some(schema), Some(raw)) = (endpoint.path_params(), params.path_params.as_ref()) {
        let validated = validate_into_value(schema, raw, InputPart::PathParams)?;
        let Value::Object(map) = validated else {
            return Err(CallError::InvalidInput {
                part: InputPart::PathParams,
                source: Issue::root("path parameters must be an object").into(),
            });
        };
        path = substitute_path(&path, &map);
    }

    let query = match (endpoint.query(), params.query.as_ref()) {
        (Some(schema), Some(raw)) => Some(validate_into_value(schema, raw, InputPart::Query)?),
        _ => None,
    };

    Ok(PreparedRequest {
        path: normalize_path(&path).to_string(),
        query,
    })
}

/// Validate `raw` and re-encode the schema's output as JSON.
pub(crate) fn validate_into_value<S>(schema: &S, raw: &Value, part: InputPart) -> Result<Value, CallError>
where
    S: Schema + ?Sized,
    S::Output: Serialize,
{
    let output = schema
        .validate(raw)
        .map_err(|source| CallError::InvalidInput { part, source })?;
    serde_json::to_value(output).map_err(|e| CallError::InvalidInput {
        part,
        source: ValidationError::from(Issue::root(e.to_string())),
    })
}

/// Replace each `:key` placeholder with the percent-encoded value.
///
/// Only occurrences followed by `/` or the end of the template are
/// replaced, so `:id` never matches inside `:identifier`.
pub fn substitute_path(template: &str, params: &Map<String, Value>) -> String {
    params.iter().fold(template.to_string(), |path, (key, value)| {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let encoded = utf8_percent_encode(&text, COMPONENT).to_string();
        replace_placeholder(&path, key, &encoded)
    })
}

fn replace_placeholder(path: &str, key: &str, replacement: &str) -> String {
    let needle = format!(":{key}");
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find(&needle) {
        let end = start + needle.len();
        let tail = &rest[end..];
        out.push_str(&rest[..start]);
        if tail.is_empty() || tail.starts_with('/') {
            out.push_str(replacement);
        } else {
            out.push_str(&needle);
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Strip leading separators so the path joins onto a configured base URL.
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Issues, PathParams, Refine, Typed};
    use percent_encoding::percent_decode_str;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct IdParams {
        id: String,
    }

    impl PathParams for IdParams {
        const KEYS: &'static [&'static str] = &["id"];
    }

    impl Refine for IdParams {
        fn refine(&self, issues: &mut Issues) {
            issues.ensure(!self.id.is_empty(), "id", "must not be empty");
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Page {
        page: u32,
    }

    impl Refine for Page {}

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn encodes_separator_and_strips_leading_slash() {
        let ep = Endpoint::get("/data/:id", Typed::<Value>::new())
            .path_params(Typed::<IdParams>::new())
            .build();
        let prepared = prepare(&ep, &Params::new().path(json!({"id": "a/b"}))).unwrap();
        assert_eq!(prepared.path, "data/a%2Fb");
        assert!(prepared.query.is_none());
    }

    #[test]
    fn does_not_touch_longer_placeholder() {
        let path = substitute_path("/users/:id/:identifier", &map(json!({"id": "7"})));
        assert_eq!(path, "/users/7/:identifier");
    }

    #[test]
    fn replaces_placeholder_at_end_and_mid_template() {
        let path = substitute_path("/orgs/:org/users/:id", &map(json!({"org": "acme", "id": 42})));
        assert_eq!(path, "/orgs/acme/users/42");
    }

    #[test]
    fn encodes_reserved_characters() {
        let path = substitute_path("/files/:name", &map(json!({"name": "a b?c#d:e%"})));
        assert_eq!(path, "/files/a%20b%3Fc%23d%3Ae%25");
    }

    #[test]
    fn keeps_unreserved_marks() {
        let path = substitute_path("/files/:name", &map(json!({"name": "it's-(ok)_~.*!"})));
        assert_eq!(path, "/files/it's-(ok)_~.*!");
    }

    #[test]
    fn invalid_path_params_fail_with_part() {
        let ep = Endpoint::get("/users/:id", Typed::<Value>::new())
            .path_params(Typed::<IdParams>::new())
            .build();
        let err = prepare(&ep, &Params::new().path(json!({"id": ""}))).unwrap_err();
        match err {
            CallError::InvalidInput { part, source } => {
                assert_eq!(part, InputPart::PathParams);
                assert_eq!(source.issues, vec![Issue::new("id", "must not be empty")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn query_is_validated_and_passed_through() {
        let ep = Endpoint::get("/users", Typed::<Value>::new())
            .query(Typed::<Page>::new())
            .build();
        let prepared = prepare(&ep, &Params::new().query(json!({"page": 3}))).unwrap();
        assert_eq!(prepared.path, "users");
        assert_eq!(prepared.query, Some(json!({"page": 3})));

        let err = prepare(&ep, &Params::new().query(json!({"page": "x"}))).unwrap_err();
        assert!(matches!(err, CallError::InvalidInput { part: InputPart::Query, .. }));
    }

    #[test]
    fn query_without_schema_is_dropped() {
        let ep = Endpoint::get("/users", Typed::<Value>::new()).build();
        let prepared = prepare(&ep, &Params::new().query(json!({"page": 1}))).unwrap();
        assert!(prepared.query.is_none());
    }

    #[test]
    fn normalize_strips_every_leading_slash() {
        assert_eq!(normalize_path("///users/1"), "users/1");
        assert_eq!(normalize_path("users"), "users");
    }

    proptest! {
        #[test]
        fn substituted_value_decodes_back(id in "\\PC{1,24}", prefix in "[a-z]{1,8}") {
            let template = format!("/{prefix}/:id");
            let path = substitute_path(&template, &map(json!({"id": id.clone()})));
            let expected_prefix = format!("/{prefix}/");
            prop_assert!(path.starts_with(&expected_prefix));
            let encoded = &path[expected_prefix.len()..];
            prop_assert!(!encoded.contains('/'));
            let decoded = percent_decode_str(encoded).decode_utf8().unwrap();
            prop_assert_eq!(&*decoded, id.as_str());
        }

        #[test]
        fn templates_without_the_key_are_unchanged(template in "(/[a-z]{1,6}){1,4}") {
            let path = substitute_path(&template, &map(json!({"id": "x/y"})));
            prop_assert_eq!(path, template);
        }
    }
}

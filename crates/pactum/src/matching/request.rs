//! HTTP message matching: method, path, headers, query and body sections.

use super::engine::Engine;
use super::mismatch::{MatchResult, Mismatch, MismatchKind};
use super::path::child_index;
use super::query::QueryParams;
use crate::interaction::{RequestPattern, ResponsePattern};
use crate::matchers::{Matcher, Pattern};
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;

/// Header values by name, in the order received.
pub type HeaderMap = BTreeMap<String, Vec<String>>;

/// An actual HTTP request as observed by the mock server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    /// Decoded request path.
    pub path: String,
    pub query: QueryParams,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// An actual HTTP response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value by case-insensitive name, repeated values joined with `", "`.
    pub fn header(&self, name: &str) -> Option<String> {
        header_value(&self.headers, name)
    }

    /// The body as JSON when it parses, else as a string; `None` when empty.
    pub fn body_value(&self) -> Option<Value> {
        body_value(&self.body, self.header("content-type").as_deref())
    }
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<String> {
        header_value(&self.headers, name)
    }
}

pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .flat_map(|(_, v)| v.iter().map(String::as_str))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// Case-insensitive method equality.
pub fn match_method(expected: &str, actual: &str) -> MatchResult {
    if expected.eq_ignore_ascii_case(actual) {
        return MatchResult::default();
    }
    MatchResult::from(vec![Mismatch::new(
        MismatchKind::Method,
        "method",
        expected.to_uppercase(),
        Some(Value::String(actual.to_string())),
        format!("expected method {} but got {}", expected.to_uppercase(), actual),
    )])
}

/// Path pattern against the decoded request path.
pub fn match_path(expected: &Pattern, actual: &str) -> MatchResult {
    Engine::new(MismatchKind::Path, true).run(expected, &Value::String(actual.to_string()), "$")
}

/// Expected headers against actual ones. Names are case-insensitive; extra
/// actual headers are allowed.
pub fn match_headers(expected: &BTreeMap<String, Pattern>, actual: &HeaderMap) -> MatchResult {
    let engine = Engine::new(MismatchKind::Header, true);
    let mut result = MatchResult::default();
    for (name, pattern) in expected {
        let Some(value) = header_value(actual, name) else {
            result.mismatches.push(Mismatch::new(
                MismatchKind::Header,
                name,
                pattern.to_string(),
                None,
                format!("expected header '{name}' but it was missing"),
            ));
            continue;
        };
        if name.eq_ignore_ascii_case("content-type") {
            if let Some(expected_type) = literal_string(pattern) {
                if content_type_matches(expected_type, &value) {
                    continue;
                }
            }
        }
        result.merge(engine.run(pattern, &Value::String(value), name));
    }
    result
}

/// Expected parameters against the actual multimap, value by value. A count
/// difference or an actual key absent from the expectation is a mismatch.
pub fn match_query(expected: &BTreeMap<String, Vec<Pattern>>, actual: &QueryParams) -> MatchResult {
    let engine = Engine::new(MismatchKind::Query, true);
    let mut result = MatchResult::default();
    for (name, patterns) in expected {
        let values = actual.get(name).map(Vec::as_slice).unwrap_or_default();
        if values.len() != patterns.len() {
            result.mismatches.push(Mismatch::new(
                MismatchKind::Query,
                name,
                Pattern::Array(patterns.clone()).to_string(),
                (!values.is_empty()).then(|| strings(values)),
                format!(
                    "expected {} value(s) for query parameter '{name}' but got {}",
                    patterns.len(),
                    values.len()
                ),
            ));
        }
        for (i, (pattern, value)) in patterns.iter().zip(values).enumerate() {
            result.merge(engine.run(
                pattern,
                &Value::String(value.clone()),
                &child_index(name, i),
            ));
        }
    }
    for (name, values) in actual {
        if !expected.contains_key(name) {
            result.mismatches.push(Mismatch::new(
                MismatchKind::Query,
                name,
                "no parameter",
                Some(strings(values)),
                format!("unexpected query parameter '{name}'"),
            ));
        }
    }
    result
}

/// Body pattern against raw bytes. No expectation accepts anything.
pub fn match_body(expected: Option<&Pattern>, body: &[u8], content_type: Option<&str>) -> MatchResult {
    let Some(pattern) = expected else {
        return MatchResult::default();
    };
    let Some(actual) = body_value(body, content_type) else {
        return MatchResult::from(vec![Mismatch::new(
            MismatchKind::Body,
            "$",
            pattern.to_string(),
            None,
            "expected a body but it was empty",
        )]);
    };
    if is_json(content_type) && serde_json::from_slice::<Value>(body).is_err() {
        return MatchResult::from(vec![Mismatch::new(
            MismatchKind::Body,
            "$",
            pattern.to_string(),
            Some(actual),
            "body is declared as JSON but does not parse",
        )]);
    }
    Engine::new(MismatchKind::Body, false).run(pattern, &actual, "$")
}

/// Status code equality.
pub fn match_status(expected: u16, actual: u16) -> MatchResult {
    if expected == actual {
        return MatchResult::default();
    }
    MatchResult::from(vec![Mismatch::new(
        MismatchKind::Status,
        "status",
        expected.to_string(),
        Some(Value::from(actual)),
        format!("expected status {expected} but got {actual}"),
    )])
}

/// Method and path only: the candidate filter used before full matching.
pub fn match_route(expected: &RequestPattern, actual: &HttpRequest) -> MatchResult {
    let mut result = match_method(&expected.method, &actual.method);
    result.merge(match_path(&expected.path, &actual.path));
    result
}

/// Every section of a request.
pub fn match_request(expected: &RequestPattern, actual: &HttpRequest) -> MatchResult {
    let mut result = match_route(expected, actual);
    result.merge(match_headers(&expected.headers, &actual.headers));
    result.merge(match_query(&expected.query, &actual.query));
    result.merge(match_body(
        expected.body.as_ref(),
        &actual.body,
        actual.header("content-type").as_deref(),
    ));
    result
}

/// Every section of a response.
pub fn match_response(expected: &ResponsePattern, actual: &HttpResponse) -> MatchResult {
    let mut result = match_status(expected.status, actual.status);
    result.merge(match_headers(&expected.headers, &actual.headers));
    result.merge(match_body(
        expected.body.as_ref(),
        &actual.body,
        actual.header("content-type").as_deref(),
    ));
    result
}

pub(crate) fn is_json(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let media = media_type(ct).to_ascii_lowercase();
        media == "application/json" || media.ends_with("+json")
    })
}

/// JSON when declared or parseable, else the lossy UTF-8 text.
pub(crate) fn body_value(body: &[u8], content_type: Option<&str>) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    let declared_other = content_type.is_some() && !is_json(content_type);
    if !declared_other {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            return Some(value);
        }
    }
    Some(Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

fn content_type_matches(expected: &str, actual: &str) -> bool {
    if expected.trim().eq_ignore_ascii_case(actual.trim()) {
        return true;
    }
    !expected.contains(';') && media_type(actual).eq_ignore_ascii_case(expected.trim())
}

fn literal_string(pattern: &Pattern) -> Option<&str> {
    match pattern {
        Pattern::String(s) => Some(s),
        Pattern::Matcher(m) => match m.as_ref() {
            Matcher::Literal(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn strings(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

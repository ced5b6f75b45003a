//! Interaction data model: provider states plus request/response patterns.

use crate::error::ConfigurationError;
use crate::matchers::Pattern;
use crate::matching::path::child_index;
use crate::matching::{
    match_request, match_response, match_route, HttpRequest, HttpResponse, MatchResult,
};
use hyper::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============================================================================
// Provider States
// ============================================================================

/// A named precondition the provider must establish, with optional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl ProviderState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

// ============================================================================
// Request / Response Patterns
// ============================================================================

/// What the consumer will send.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPattern {
    pub method: String,
    pub path: Pattern,
    pub headers: BTreeMap<String, Pattern>,
    /// Values per name, matched positionally.
    pub query: BTreeMap<String, Vec<Pattern>>,
    pub body: Option<Pattern>,
}

impl RequestPattern {
    pub fn new(method: impl Into<String>, path: impl Into<Pattern>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    /// Method and path only.
    pub fn matches_route(&self, actual: &HttpRequest) -> MatchResult {
        match_route(self, actual)
    }

    pub fn matches(&self, actual: &HttpRequest) -> MatchResult {
        match_request(self, actual)
    }
}

/// What the provider is expected to answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePattern {
    pub status: u16,
    pub headers: BTreeMap<String, Pattern>,
    pub body: Option<Pattern>,
}

/// A concrete response synthesized from a [`ResponsePattern`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl GeneratedResponse {
    /// Body bytes: strings are sent verbatim, everything else as JSON.
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            None => Vec::new(),
            Some(Value::String(s)) => s.clone().into_bytes(),
            Some(other) => other.to_string().into_bytes(),
        }
    }
}

impl ResponsePattern {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Status, headers and body filled with each matcher's example.
    /// A JSON container body without a declared content type gets
    /// `application/json`.
    pub fn generate(&self) -> GeneratedResponse {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, pattern)| (name.clone(), pattern.generate_string()))
            .collect();
        let body = self.body.as_ref().map(Pattern::generate);
        let has_content_type = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
        if !has_content_type && self.body.as_ref().is_some_and(Pattern::is_container) {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        GeneratedResponse {
            status: self.status,
            headers,
            body,
        }
    }

    pub fn matches(&self, actual: &HttpResponse) -> MatchResult {
        match_response(self, actual)
    }
}

// ============================================================================
// Interaction
// ============================================================================

/// One expected request/response exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub description: String,
    pub provider_states: Vec<ProviderState>,
    pub request: RequestPattern,
    pub response: ResponsePattern,
}

impl Interaction {
    pub fn new(
        description: impl Into<String>,
        request: RequestPattern,
        response: ResponsePattern,
    ) -> Self {
        Self {
            description: description.into(),
            provider_states: Vec::new(),
            request,
            response,
        }
    }

    /// Identity used for duplicate detection and pact merging.
    pub fn identity(&self) -> (&str, &[ProviderState]) {
        (&self.description, &self.provider_states)
    }

    pub fn same_identity(&self, other: &Interaction) -> bool {
        self.identity() == other.identity()
    }

    /// Parameters of every provider state merged; later states win.
    pub fn merged_params(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for state in &self.provider_states {
            for (key, value) in &state.params {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Structural checks plus matcher validation for every pattern.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidInteraction {
            description: self.description.clone(),
            reason,
        };
        if self.description.trim().is_empty() {
            return Err(invalid("description must not be empty".into()));
        }
        let method = &self.request.method;
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid(format!("invalid HTTP method '{method}'")));
        }
        if !(100..=599).contains(&self.response.status) {
            return Err(invalid(format!(
                "invalid response status {}",
                self.response.status
            )));
        }
        if self.provider_states.iter().any(|s| s.name.trim().is_empty()) {
            return Err(invalid("provider state names must not be empty".into()));
        }

        self.request.path.validate("request.path")?;
        for (name, pattern) in &self.request.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(invalid(format!("invalid request header name '{name}'")));
            }
            pattern.validate(&format!("request.headers.{name}"))?;
        }
        for (name, patterns) in &self.request.query {
            for (i, pattern) in patterns.iter().enumerate() {
                pattern.validate(&child_index(&format!("request.query.{name}"), i))?;
            }
        }
        if let Some(body) = &self.request.body {
            body.validate("request.body")?;
        }
        for (name, pattern) in &self.response.headers {
            pattern.validate(&format!("response.headers.{name}"))?;
        }
        if let Some(body) = &self.response.body {
            body.validate("response.body")?;
        }
        self.validate_response_headers()
    }

    /// Every generated response header must be sendable as-is.
    /// Checked again after provider-state resolution.
    pub(crate) fn validate_response_headers(&self) -> Result<(), ConfigurationError> {
        for (name, value) in self.response.generate().headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigurationError::InvalidInteraction {
                    description: self.description.clone(),
                    reason: format!("invalid response header name '{name}'"),
                });
            }
            if HeaderValue::from_str(&value).is_err() {
                return Err(ConfigurationError::InvalidInteraction {
                    description: self.description.clone(),
                    reason: format!("invalid value {value:?} for response header '{name}'"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::*;
    use serde_json::json;

    fn interaction() -> Interaction {
        let mut request = RequestPattern::new("post", "/foobar");
        request.headers.insert("Authorization".into(), like("Bearer 1234"));
        let mut response = ResponsePattern::new(200);
        response.body = Some(Pattern::object([("id", integer(1))]));
        Interaction::new("a request to do a foo", request, response)
    }

    #[test]
    fn test_method_is_normalized() {
        assert_eq!(interaction().request.method, "POST");
    }

    #[test]
    fn test_generate_adds_json_content_type() {
        let generated = interaction().response.generate();
        assert_eq!(generated.status, 200);
        assert_eq!(
            generated.headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
        assert_eq!(generated.body, Some(json!({"id": 1})));
        assert_eq!(generated.body_bytes(), br#"{"id":1}"#.to_vec());
    }

    #[test]
    fn test_declared_content_type_is_kept() {
        let mut response = ResponsePattern::new(200);
        response
            .headers
            .insert("content-type".into(), s("application/vnd+json"));
        response.body = Some(Pattern::object([("a", 1)]));
        let generated = response.generate();
        assert_eq!(generated.headers.len(), 1);
        assert_eq!(generated.headers[0].1, "application/vnd+json");
    }

    #[test]
    fn test_identity_includes_provider_states() {
        let a = interaction();
        let mut b = interaction();
        assert!(a.same_identity(&b));
        b.provider_states.push(ProviderState::new("User foo exists"));
        assert!(!a.same_identity(&b));
    }

    #[test]
    fn test_merged_params_later_states_win() {
        let mut i = interaction();
        let first = json!({"id": 1, "name": "a"});
        let second = json!({"id": 2});
        i.provider_states.push(ProviderState::with_params(
            "first",
            first.as_object().cloned().unwrap(),
        ));
        i.provider_states.push(ProviderState::with_params(
            "second",
            second.as_object().cloned().unwrap(),
        ));
        let merged = i.merged_params();
        assert_eq!(merged["id"], json!(2));
        assert_eq!(merged["name"], json!("a"));
    }

    #[test]
    fn test_validate_rejects_bad_interactions() {
        let mut i = interaction();
        i.response.status = 42;
        assert!(matches!(
            i.validate(),
            Err(ConfigurationError::InvalidInteraction { .. })
        ));

        let mut i = interaction();
        i.request.body = Some(array_min_max_like(1, 5, 2));
        assert!(matches!(
            i.validate(),
            Err(ConfigurationError::InvalidMatcher { .. })
        ));

        assert!(interaction().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unsendable_headers() {
        let mut i = interaction();
        i.response.headers.insert("X-Bad".into(), s("line1\nline2"));
        match i.validate() {
            Err(ConfigurationError::InvalidInteraction { reason, .. }) => {
                assert!(reason.contains("X-Bad"), "{reason}")
            }
            other => panic!("unexpected result {other:?}"),
        }

        let mut i = interaction();
        i.response.headers.insert("bad header".into(), s("x"));
        assert!(matches!(
            i.validate(),
            Err(ConfigurationError::InvalidInteraction { .. })
        ));

        let mut i = interaction();
        i.request.headers.insert("no:colons".into(), s("x"));
        assert!(matches!(
            i.validate(),
            Err(ConfigurationError::InvalidInteraction { .. })
        ));
    }
}

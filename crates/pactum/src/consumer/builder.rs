//! Fluent construction of interactions.

use crate::error::ConfigurationError;
use crate::interaction::{Interaction, ProviderState, RequestPattern, ResponsePattern};
use crate::matchers::Pattern;
use serde_json::Value;
use std::collections::BTreeMap;

const JSON: &str = "application/json";

fn has_content_type(headers: &BTreeMap<String, Pattern>) -> bool {
    headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"))
}

/// Builds the request half of an interaction.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pattern: RequestPattern,
}

impl RequestBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Pattern>) -> Self {
        self.pattern.headers.insert(name.into(), value.into());
        self
    }

    /// Expected values of a query parameter, in order.
    pub fn query<P: Into<Pattern>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = P>,
    ) -> Self {
        self.pattern
            .query
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// JSON body; declares `Content-Type: application/json` unless set.
    pub fn json_body(mut self, body: impl Into<Pattern>) -> Self {
        if !has_content_type(&self.pattern.headers) {
            self.pattern
                .headers
                .insert("Content-Type".into(), Pattern::from(JSON));
        }
        self.pattern.body = Some(body.into());
        self
    }

    /// Body with an explicit content type.
    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Pattern>) -> Self {
        let content_type: String = content_type.into();
        self.pattern
            .headers
            .insert("Content-Type".into(), Pattern::from(content_type));
        self.pattern.body = Some(body.into());
        self
    }
}

/// Builds the response half of an interaction.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    pattern: ResponsePattern,
}

impl ResponseBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Pattern>) -> Self {
        self.pattern.headers.insert(name.into(), value.into());
        self
    }

    pub fn json_body(mut self, body: impl Into<Pattern>) -> Self {
        if !has_content_type(&self.pattern.headers) {
            self.pattern
                .headers
                .insert("Content-Type".into(), Pattern::from(JSON));
        }
        self.pattern.body = Some(body.into());
        self
    }

    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Pattern>) -> Self {
        let content_type: String = content_type.into();
        self.pattern
            .headers
            .insert("Content-Type".into(), Pattern::from(content_type));
        self.pattern.body = Some(body.into());
        self
    }
}

/// Sugar over [`Interaction`].
///
/// ```
/// use pactum::consumer::InteractionBuilder;
/// use pactum::matchers::{like, regex};
/// use serde_json::json;
///
/// let interaction = InteractionBuilder::new()
///     .given_with_params("User foo exists", json!({"name": "billy"}))
///     .upon_receiving("A request to do a foo")
///     .with_request("POST", "/foobar", |req| {
///         req.header("Authorization", regex("Bearer 1234", "Bearer [0-9]+"))
///             .query("baz", [regex("bar", "[a-z]+")])
///             .json_body(json!({"id": 27}))
///     })
///     .will_respond_with(200, |res| res.json_body(like(json!({"id": 27}))))
///     .build()
///     .unwrap();
/// assert_eq!(interaction.provider_states.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct InteractionBuilder {
    description: String,
    provider_states: Vec<ProviderState>,
    request: RequestPattern,
    response: ResponsePattern,
    error: Option<ConfigurationError>,
}

impl Default for InteractionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionBuilder {
    pub fn new() -> Self {
        Self {
            description: String::new(),
            provider_states: Vec::new(),
            request: RequestPattern::new("GET", "/"),
            response: ResponsePattern::new(200),
            error: None,
        }
    }

    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.provider_states.push(ProviderState::new(state));
        self
    }

    /// Provider state with parameters; `params` must be a JSON object.
    pub fn given_with_params(mut self, state: impl Into<String>, params: Value) -> Self {
        let state = state.into();
        match params {
            Value::Object(map) => self
                .provider_states
                .push(ProviderState::with_params(state, map)),
            other => {
                self.error.get_or_insert(ConfigurationError::Invalid(format!(
                    "parameters of provider state '{state}' must be a JSON object, got {other}"
                )));
            }
        }
        self
    }

    pub fn upon_receiving(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_request<F>(mut self, method: impl Into<String>, path: impl Into<Pattern>, build: F) -> Self
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let builder = RequestBuilder {
            pattern: RequestPattern::new(method, path),
        };
        self.request = build(builder).pattern;
        self
    }

    pub fn will_respond_with<F>(mut self, status: u16, build: F) -> Self
    where
        F: FnOnce(ResponseBuilder) -> ResponseBuilder,
    {
        let builder = ResponseBuilder {
            pattern: ResponsePattern::new(status),
        };
        self.response = build(builder).pattern;
        self
    }

    /// The interaction, validated.
    pub fn build(self) -> Result<Interaction, ConfigurationError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut interaction = Interaction::new(self.description, self.request, self.response);
        interaction.provider_states = self.provider_states;
        interaction.validate()?;
        Ok(interaction)
    }
}

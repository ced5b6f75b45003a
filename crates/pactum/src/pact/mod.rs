//! Contract artifact: Pact V4 documents.
//!
//! A [`Pact`] holds interactions in registration order. It converts to and
//! from the V4 JSON shape, carrying matchers as matching rules and generators
//! beside example content, and is written by [`PactWriter`].
//!
//! # Module Structure
//!
//! - `document` - serde types for the JSON document
//! - `rules` - pattern trees to/from matching rules and generators
//! - `writer` - `PactWriter` and `PactReader`

mod document;
mod rules;
mod writer;

pub use document::{
    BodyDocument, Encoding, Generator, Generators, InteractionDocument, MatchingRule,
    MatchingRules, Metadata, PactDocument, Participant, RequestDocument, ResponseDocument,
    RuleList, Variant, PACT_SPECIFICATION_VERSION, SYNCHRONOUS_HTTP,
};
pub use writer::{PactReader, PactWriter};

use crate::error::ConfigurationError;
use crate::interaction::{Interaction, RequestPattern, ResponsePattern};
use crate::matchers::Pattern;
use crate::matching::is_json;
use base64::Engine as _;
use rules::{collect_query, rebuild_query, RuleSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Errors reading or writing contract files.
#[derive(Debug, thiserror::Error)]
pub enum PactError {
    #[error("failed to access pact file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pact JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pact document: {0}")]
    Format(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// How an existing contract file is treated on write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Overwrite,
    /// Replace interactions with the same identity, append the rest.
    Merge,
}

/// A consumer/provider contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Pact {
    pub consumer: String,
    pub provider: String,
    pub interactions: Vec<Interaction>,
}

impl Pact {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            interactions: Vec::new(),
        }
    }

    /// `<consumer>-<provider>.json`. Characters other than alphanumerics,
    /// `-`, `_`, `.` and spaces become `_`, so the name never leaves the
    /// pact directory.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            file_component(&self.consumer),
            file_component(&self.provider)
        )
    }

    /// Fold `other` into this pact: same-identity interactions are replaced in
    /// place, new ones appended.
    pub fn merge(&mut self, other: Pact) -> Result<(), PactError> {
        if self.consumer != other.consumer || self.provider != other.provider {
            return Err(ConfigurationError::Invalid(format!(
                "cannot merge pact {}/{} into {}/{}",
                other.consumer, other.provider, self.consumer, self.provider
            ))
            .into());
        }
        for interaction in other.interactions {
            match self
                .interactions
                .iter_mut()
                .find(|existing| existing.same_identity(&interaction))
            {
                Some(existing) => *existing = interaction,
                None => self.interactions.push(interaction),
            }
        }
        Ok(())
    }

    pub fn to_document(&self) -> PactDocument {
        PactDocument {
            consumer: Participant {
                name: self.consumer.clone(),
            },
            provider: Participant {
                name: self.provider.clone(),
            },
            interactions: self.interactions.iter().map(interaction_document).collect(),
            metadata: Metadata::default(),
        }
    }

    pub fn from_document(document: PactDocument) -> Result<Self, PactError> {
        let interactions = document
            .interactions
            .into_iter()
            .map(interaction_from_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            consumer: document.consumer.name,
            provider: document.provider.name,
            interactions,
        })
    }

    /// Pretty JSON with sorted keys and a trailing newline. No timestamps, so
    /// the same pact always renders to the same bytes.
    pub fn to_json(&self) -> Result<String, PactError> {
        let value = sort_keys(serde_json::to_value(self.to_document())?);
        let mut json = serde_json::to_string_pretty(&value)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self, PactError> {
        Self::from_document(serde_json::from_str(json)?)
    }
}

fn file_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

// ============================================================================
// Interaction -> Document
// ============================================================================

fn interaction_document(interaction: &Interaction) -> InteractionDocument {
    InteractionDocument {
        kind: SYNCHRONOUS_HTTP.to_string(),
        description: interaction.description.clone(),
        provider_states: interaction.provider_states.clone(),
        request: request_document(&interaction.request),
        response: response_document(&interaction.response),
    }
}

fn request_document(request: &RequestPattern) -> RequestDocument {
    let mut matching_rules = MatchingRules::default();
    let mut generators = Generators::default();

    let path = RuleSet::collect(&request.path, "$");
    matching_rules.path = path.rules.get("$").cloned();
    generators.path = path.generators.get("$").cloned();

    let headers = header_documents(&request.headers, &mut matching_rules, &mut generators);

    let mut query = BTreeMap::new();
    for (name, patterns) in &request.query {
        query.insert(
            name.clone(),
            patterns.iter().map(Pattern::generate_string).collect(),
        );
        let set = collect_query(name, patterns);
        matching_rules.query.extend(set.rules);
        generators.query.extend(set.generators);
    }

    let body = request.body.as_ref().map(|pattern| {
        body_document(pattern, &headers, &mut matching_rules, &mut generators)
    });

    RequestDocument {
        method: request.method.clone(),
        path: request.path.generate_string(),
        query,
        headers,
        body,
        matching_rules,
        generators,
    }
}

fn response_document(response: &ResponsePattern) -> ResponseDocument {
    let mut matching_rules = MatchingRules::default();
    let mut generators = Generators::default();
    let headers = header_documents(&response.headers, &mut matching_rules, &mut generators);
    let body = response.body.as_ref().map(|pattern| {
        body_document(pattern, &headers, &mut matching_rules, &mut generators)
    });
    ResponseDocument {
        status: response.status,
        headers,
        body,
        matching_rules,
        generators,
    }
}

fn header_documents(
    headers: &BTreeMap<String, Pattern>,
    matching_rules: &mut MatchingRules,
    generators: &mut Generators,
) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    for (name, pattern) in headers {
        out.insert(name.clone(), vec![pattern.generate_string()]);
        let set = RuleSet::collect(pattern, name);
        matching_rules.header.extend(set.rules);
        generators.header.extend(set.generators);
    }
    out
}

fn body_document(
    pattern: &Pattern,
    headers: &BTreeMap<String, Vec<String>>,
    matching_rules: &mut MatchingRules,
    generators: &mut Generators,
) -> BodyDocument {
    let content = pattern.generate();
    let declared = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .and_then(|(_, values)| values.first().cloned());
    let content_type = declared.unwrap_or_else(|| {
        if content.is_string() {
            "text/plain".to_string()
        } else {
            "application/json".to_string()
        }
    });
    let set = RuleSet::collect(pattern, "$");
    matching_rules.body.extend(set.rules);
    generators.body.extend(set.generators);
    BodyDocument {
        content,
        content_type: Some(content_type),
        encoded: Encoding::default(),
    }
}

// ============================================================================
// Document -> Interaction
// ============================================================================

fn interaction_from_document(document: InteractionDocument) -> Result<Interaction, PactError> {
    if document.kind != SYNCHRONOUS_HTTP {
        return Err(PactError::Format(format!(
            "interaction '{}' has unsupported type '{}'",
            document.description, document.kind
        )));
    }
    Ok(Interaction {
        request: request_from_document(&document.request)?,
        response: response_from_document(&document.response)?,
        description: document.description,
        provider_states: document.provider_states,
    })
}

fn request_from_document(document: &RequestDocument) -> Result<RequestPattern, PactError> {
    let mut path_set = RuleSet::default();
    if let Some(rules) = &document.matching_rules.path {
        path_set.rules.insert("$".to_string(), rules.clone());
    }
    if let Some(generator) = &document.generators.path {
        path_set.generators.insert("$".to_string(), generator.clone());
    }
    let mut request = RequestPattern::new(
        document.method.clone(),
        path_set.rebuild(&Value::String(document.path.clone()), "$"),
    );

    request.headers = headers_from_document(
        &document.headers,
        &document.matching_rules.header,
        &document.generators.header,
    );

    let query_set = RuleSet {
        rules: document.matching_rules.query.clone(),
        generators: document.generators.query.clone(),
    };
    for (name, values) in &document.query {
        request
            .query
            .insert(name.clone(), rebuild_query(&query_set, name, values));
    }

    request.body = body_from_document(
        document.body.as_ref(),
        &document.matching_rules.body,
        &document.generators.body,
    )?;
    Ok(request)
}

fn response_from_document(document: &ResponseDocument) -> Result<ResponsePattern, PactError> {
    let mut response = ResponsePattern::new(document.status);
    response.headers = headers_from_document(
        &document.headers,
        &document.matching_rules.header,
        &document.generators.header,
    );
    response.body = body_from_document(
        document.body.as_ref(),
        &document.matching_rules.body,
        &document.generators.body,
    )?;
    Ok(response)
}

fn headers_from_document(
    headers: &BTreeMap<String, Vec<String>>,
    rules: &BTreeMap<String, RuleList>,
    generators: &BTreeMap<String, Generator>,
) -> BTreeMap<String, Pattern> {
    let set = RuleSet {
        rules: rules.clone(),
        generators: generators.clone(),
    };
    headers
        .iter()
        .map(|(name, values)| {
            let content = Value::String(values.join(", "));
            (name.clone(), set.rebuild(&content, name))
        })
        .collect()
}

fn body_from_document(
    body: Option<&BodyDocument>,
    rules: &BTreeMap<String, RuleList>,
    generators: &BTreeMap<String, Generator>,
) -> Result<Option<Pattern>, PactError> {
    let Some(body) = body else {
        return Ok(None);
    };
    let content = match (&body.encoded, &body.content) {
        (Encoding::Named(scheme), Value::String(encoded)) if scheme == "base64" => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| PactError::Format(format!("invalid base64 body: {e}")))?;
            if is_json(body.content_type.as_deref()) {
                serde_json::from_slice(&bytes)?
            } else {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
        (_, content) => content.clone(),
    };
    let set = RuleSet {
        rules: rules.clone(),
        generators: generators.clone(),
    };
    Ok(Some(set.rebuild(&content, "$")))
}

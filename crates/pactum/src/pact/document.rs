//! Pact V4 JSON document shape.
//!
//! Field names follow the Pact specification. Maps are `BTreeMap` so the
//! serialized form is stable across runs.

use crate::interaction::ProviderState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const PACT_SPECIFICATION_VERSION: &str = "4.0";
pub const SYNCHRONOUS_HTTP: &str = "Synchronous/HTTP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PactDocument {
    pub consumer: Participant,
    pub provider: Participant,
    #[serde(default)]
    pub interactions: Vec<InteractionDocument>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub pact_specification: SpecificationVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pactum: Option<SpecificationVersion>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            pact_specification: SpecificationVersion {
                version: PACT_SPECIFICATION_VERSION.to_string(),
            },
            pactum: Some(SpecificationVersion {
                version: env!("CARGO_PKG_VERSION").to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationVersion {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDocument {
    #[serde(rename = "type", default = "synchronous_http")]
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_states: Vec<ProviderState>,
    pub request: RequestDocument,
    pub response: ResponseDocument,
}

fn synchronous_http() -> String {
    SYNCHRONOUS_HTTP.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDocument {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDocument>,
    #[serde(default, skip_serializing_if = "MatchingRules::is_empty")]
    pub matching_rules: MatchingRules,
    #[serde(default, skip_serializing_if = "Generators::is_empty")]
    pub generators: Generators,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDocument {
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDocument>,
    #[serde(default, skip_serializing_if = "MatchingRules::is_empty")]
    pub matching_rules: MatchingRules,
    #[serde(default, skip_serializing_if = "Generators::is_empty")]
    pub generators: Generators,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDocument {
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub encoded: Encoding,
}

/// `false`, or the name of the encoding (`"base64"`, `"json"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Encoding {
    Flag(bool),
    Named(String),
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Flag(false)
    }
}

// ============================================================================
// Matching Rules
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingRules {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub body: BTreeMap<String, RuleList>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, RuleList>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, RuleList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<RuleList>,
}

impl MatchingRules {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.header.is_empty() && self.query.is_empty() && self.path.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleList {
    #[serde(default = "and")]
    pub combine: String,
    pub matchers: Vec<MatchingRule>,
}

fn and() -> String {
    "AND".to_string()
}

impl RuleList {
    pub fn new(matchers: Vec<MatchingRule>) -> Self {
        Self {
            combine: and(),
            matchers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "camelCase")]
pub enum MatchingRule {
    Type {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    Regex {
        regex: String,
    },
    Integer,
    Decimal,
    Equality,
    Include {
        value: String,
    },
    ArrayContains {
        variants: Vec<Variant>,
    },
    #[serde(alias = "timestamp")]
    Datetime {
        format: String,
    },
    /// Rules this crate does not evaluate; read and dropped.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub index: usize,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleList>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub generators: BTreeMap<String, Generator>,
}

// ============================================================================
// Generators
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generators {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub body: BTreeMap<String, Generator>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, Generator>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, Generator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Generator>,
}

impl Generators {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.header.is_empty() && self.query.is_empty() && self.path.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Generator {
    ProviderState {
        expression: String,
        #[serde(rename = "dataType", default, skip_serializing_if = "Option::is_none")]
        data_type: Option<String>,
    },
    DateTime {
        format: String,
    },
    #[serde(other)]
    Unsupported,
}

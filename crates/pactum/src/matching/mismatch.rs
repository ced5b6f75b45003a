//! Mismatch records produced by the matching engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which part of the HTTP message a mismatch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchKind {
    Method,
    Path,
    Header,
    Query,
    Body,
    Status,
    /// Request-level failures: timeouts, unreadable bodies, no candidate.
    Request,
}

impl MismatchKind {
    pub fn label(&self) -> &'static str {
        match self {
            MismatchKind::Method => "method",
            MismatchKind::Path => "path",
            MismatchKind::Header => "header",
            MismatchKind::Query => "query",
            MismatchKind::Body => "body",
            MismatchKind::Status => "status",
            MismatchKind::Request => "request",
        }
    }
}

/// One divergence between expected and actual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub kind: MismatchKind,
    /// Location within the section (`$.items[1]`, `Authorization`, `baz[0]`).
    pub path: String,
    /// Description of what was expected.
    pub expected: String,
    /// Actual value; `None` when the value was absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    pub reason: String,
}

impl Mismatch {
    pub fn new(
        kind: MismatchKind,
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: Option<Value>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            expected: expected.into(),
            actual,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.label(), self.path, self.reason)
    }
}

/// Result of a match: every mismatch found, in traversal order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub mismatches: Vec<Mismatch>,
}

impl MatchResult {
    pub fn ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mismatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn merge(&mut self, other: MatchResult) {
        self.mismatches.extend(other.mismatches);
    }
}

impl From<Vec<Mismatch>> for MatchResult {
    fn from(mismatches: Vec<Mismatch>) -> Self {
        Self { mismatches }
    }
}

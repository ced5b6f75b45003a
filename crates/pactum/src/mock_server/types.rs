//! Type definitions for the mock server: lifecycle state, observed requests,
//! outcomes and errors.

use crate::error::{ConfigurationError, StateResolutionError};
use crate::matching::{HeaderMap, Mismatch, QueryParams};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Idle,
    Starting,
    Listening,
    Draining,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Idle => "idle",
            ServerState::Starting => "starting",
            ServerState::Listening => "listening",
            ServerState::Draining => "draining",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Observed Requests
// ============================================================================

/// Why one registered interaction did not match a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDiagnostic {
    pub index: usize,
    pub description: String,
    pub mismatches: Vec<Mismatch>,
}

/// How the server disposed of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RequestOutcome {
    /// Served the response of the interaction at this index.
    Matched { interaction: usize },
    /// Route matched but the request did not; closest candidate and why.
    #[serde(rename_all = "camelCase")]
    Mismatched {
        best_candidate: usize,
        mismatches: Vec<Mismatch>,
    },
    /// No interaction matched method and path.
    Unexpected {
        diagnostics: Vec<InteractionDiagnostic>,
    },
    /// The request could not be read in time.
    #[serde(rename_all = "camelCase")]
    Failed {
        best_candidate: Option<usize>,
        mismatch: Mismatch,
    },
    /// CORS pre-flight answered without an interaction.
    Preflight,
}

impl RequestOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, RequestOutcome::Matched { .. } | RequestOutcome::Preflight)
    }

    /// The interaction this outcome is attributed to, if any.
    pub fn candidate(&self) -> Option<usize> {
        match self {
            RequestOutcome::Matched { interaction } => Some(*interaction),
            RequestOutcome::Mismatched { best_candidate, .. } => Some(*best_candidate),
            RequestOutcome::Failed { best_candidate, .. } => *best_candidate,
            _ => None,
        }
    }

    pub fn mismatches(&self) -> Vec<&Mismatch> {
        match self {
            RequestOutcome::Mismatched { mismatches, .. } => mismatches.iter().collect(),
            RequestOutcome::Unexpected { diagnostics } => {
                diagnostics.iter().flat_map(|d| d.mismatches.iter()).collect()
            }
            RequestOutcome::Failed { mismatch, .. } => vec![mismatch],
            _ => Vec::new(),
        }
    }
}

/// A request as received, with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedRequest {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "QueryParams::is_empty")]
    pub query: QueryParams,
    pub headers: HeaderMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub timestamp: String,
    #[serde(flatten)]
    pub outcome: RequestOutcome,
}

impl ObservedRequest {
    fn summary(&self) -> String {
        if self.query.is_empty() {
            format!("{} {}", self.method, self.path)
        } else {
            format!(
                "{} {}?{}",
                self.method,
                self.path,
                crate::matching::encode_query(&self.query)
            )
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MockServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    StateResolution(#[from] StateResolutionError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// An interaction no request satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedInteraction {
    pub index: usize,
    pub description: String,
    /// Mismatches of requests for which this was the closest candidate.
    pub mismatches: Vec<Mismatch>,
}

/// Everything that went wrong during a mock server session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct VerificationError {
    pub unmatched_interactions: Vec<UnmatchedInteraction>,
    /// Requests that matched no interaction.
    pub unexpected_requests: Vec<ObservedRequest>,
    /// Requests that failed before an interaction could answer them: read
    /// timeouts (head or body) and unreadable bodies.
    pub timeouts: Vec<ObservedRequest>,
    /// Requests still in flight when shutdown gave up waiting.
    pub incomplete: usize,
}

impl VerificationError {
    pub fn is_empty(&self) -> bool {
        self.unmatched_interactions.is_empty()
            && self.unexpected_requests.is_empty()
            && self.timeouts.is_empty()
            && self.incomplete == 0
    }

    /// Every mismatch in the report.
    pub fn mismatches(&self) -> Vec<&Mismatch> {
        let mut all: Vec<&Mismatch> = self
            .unmatched_interactions
            .iter()
            .flat_map(|i| i.mismatches.iter())
            .collect();
        for request in self.unexpected_requests.iter().chain(&self.timeouts) {
            for mismatch in request.outcome.mismatches() {
                if !all.contains(&mismatch) {
                    all.push(mismatch);
                }
            }
        }
        all
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pact verification failed")?;
        if !self.unmatched_interactions.is_empty() {
            writeln!(
                f,
                "\nunmatched interactions ({}):",
                self.unmatched_interactions.len()
            )?;
            for interaction in &self.unmatched_interactions {
                writeln!(f, "  [{}] {}", interaction.index, interaction.description)?;
                if interaction.mismatches.is_empty() {
                    writeln!(f, "      no request was received for this interaction")?;
                }
                for mismatch in &interaction.mismatches {
                    writeln!(f, "      {mismatch}")?;
                }
            }
        }
        if !self.unexpected_requests.is_empty() {
            writeln!(
                f,
                "\nunexpected requests ({}):",
                self.unexpected_requests.len()
            )?;
            for request in &self.unexpected_requests {
                writeln!(f, "  {}", request.summary())?;
                match &request.outcome {
                    RequestOutcome::Unexpected { diagnostics } => {
                        if diagnostics.is_empty() {
                            writeln!(f, "      no interactions are registered")?;
                        }
                        for diagnostic in diagnostics {
                            writeln!(
                                f,
                                "      vs [{}] {}:",
                                diagnostic.index, diagnostic.description
                            )?;
                            for mismatch in &diagnostic.mismatches {
                                writeln!(f, "        {mismatch}")?;
                            }
                        }
                    }
                    outcome => {
                        for mismatch in outcome.mismatches() {
                            writeln!(f, "      {mismatch}")?;
                        }
                    }
                }
            }
        }
        if !self.timeouts.is_empty() {
            writeln!(f, "\ntimed out or failed requests ({}):", self.timeouts.len())?;
            for request in &self.timeouts {
                writeln!(f, "  {}", request.summary())?;
                for mismatch in request.outcome.mismatches() {
                    writeln!(f, "      {mismatch}")?;
                }
            }
        }
        if self.incomplete > 0 {
            writeln!(
                f,
                "\nincomplete requests: {} still in flight at shutdown",
                self.incomplete
            )?;
        }
        Ok(())
    }
}

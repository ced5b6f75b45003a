//! Error taxonomy shared across the crate.
//!
//! Module-specific errors (`MockServerError`, `PactError`, `VerificationError`)
//! live next to the code that raises them; this module holds the errors that
//! several layers produce plus the top-level [`Error`] used by the test helper.

use crate::mock_server::{MockServerError, VerificationError};
use crate::pact::PactError;

/// Invalid interaction registration, matcher definition, or configuration.
///
/// Always surfaced before the mock server starts accepting requests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("invalid matcher at {path}: {reason}")]
    InvalidMatcher { path: String, reason: String },
    #[error("interaction '{description}' is already registered with the same provider states")]
    DuplicateInteraction { description: String },
    #[error("invalid interaction '{description}': {reason}")]
    InvalidInteraction { description: String, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("mock server is {state}: {reason}")]
    Lifecycle { state: String, reason: String },
}

impl ConfigurationError {
    pub(crate) fn matcher(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidMatcher {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A provider-state expression could not be resolved and had no fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "interaction '{description}': provider state expression '{expression}' could not be \
     resolved from the supplied parameters and has no fallback value"
)]
pub struct StateResolutionError {
    pub description: String,
    pub expression: String,
}

/// Top-level error returned by [`crate::consumer::PactBuilder::execute_test`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    StateResolution(#[from] StateResolutionError),
    #[error(transparent)]
    MockServer(MockServerError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Pact(#[from] PactError),
    /// The test body itself reported a failure.
    #[error("test body failed: {0:#}")]
    Test(anyhow::Error),
}

impl From<MockServerError> for Error {
    fn from(err: MockServerError) -> Self {
        match err {
            MockServerError::Configuration(e) => Error::Configuration(e),
            MockServerError::StateResolution(e) => Error::StateResolution(e),
            MockServerError::Verification(e) => Error::Verification(e),
            other => Error::MockServer(other),
        }
    }
}

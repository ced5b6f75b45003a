//! Pactum: consumer-driven contract testing.
//!
//! A consumer describes the HTTP interactions it expects from a provider,
//! exercises them against a local mock server, and the matched interactions
//! are written as a Pact V4 contract for later provider verification.

// ===== Core model =====
pub mod error;
pub mod interaction;
pub mod matchers;
pub mod matching;

// ===== Mock provider and contract output =====
pub mod mock_server;
pub mod pact;

// ===== Test orchestration =====
pub mod consumer;

pub use consumer::{InteractionBuilder, MockServerInfo, PactBuilder};
pub use error::{ConfigurationError, Error, StateResolutionError};
pub use interaction::{Interaction, InteractionRegistry, ProviderState, RequestPattern, ResponsePattern};
pub use matchers::{Matcher, Pattern};
pub use matching::{match_pattern, MatchResult, Mismatch, MismatchKind};
pub use mock_server::{MockServer, MockServerConfig, MockServerError, TlsConfig, VerificationError};
pub use pact::{Pact, PactError, PactReader, PactWriter, WriteMode};

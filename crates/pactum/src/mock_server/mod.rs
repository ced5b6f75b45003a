//! Mock provider: an HTTP(S) listener serving registered interactions.
//!
//! Each incoming request is matched against the interactions in registration
//! order; the first full match is served from its response pattern and marked
//! matched, anything else gets a 500 with mismatch detail. Every request is
//! logged with its outcome for [`MockServer::verify`].
//!
//! # Module Structure
//!
//! - `config` - `MockServerConfig` and `TlsConfig`
//! - `types` - lifecycle state, observed requests, errors
//! - `core` - shared state: interaction slots and request log
//! - `handler` - per-request matching and response selection
//! - `response` - response builders
//! - `server` - `MockServer` lifecycle and accept loop
//! - `tls` - acceptors, self-signed certificates, insecure client config

mod config;
mod core;
mod handler;
mod response;
mod server;
pub mod tls;
mod types;

#[cfg(test)]
mod tests;

pub use config::{MockServerConfig, TlsConfig};
pub use core::MockServerState;
pub use server::MockServer;
pub use types::{
    InteractionDiagnostic, MockServerError, ObservedRequest, RequestOutcome, ServerState,
    UnmatchedInteraction, VerificationError,
};

//! Consumer-side helpers: a fluent interaction builder and the test
//! orchestrator that runs a test body against a live mock server.
//!
//! # Module Structure
//!
//! - `builder` - `InteractionBuilder`, `RequestBuilder`, `ResponseBuilder`
//! - `pact_builder` - `PactBuilder::execute_test` and `MockServerInfo`

mod builder;
mod pact_builder;

pub use builder::{InteractionBuilder, RequestBuilder, ResponseBuilder};
pub use pact_builder::{MockServerInfo, PactBuilder};

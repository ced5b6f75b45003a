//! Interaction model: what the consumer expects to send and receive.
//!
//! # Module Structure
//!
//! - `types` - `Interaction`, `RequestPattern`, `ResponsePattern`, `ProviderState`
//! - `resolve` - provider-state expression resolution
//! - `registry` - ordered, duplicate-free registration

mod registry;
mod resolve;
mod types;

pub use registry::InteractionRegistry;
pub use resolve::evaluate;
pub use types::{GeneratedResponse, Interaction, ProviderState, RequestPattern, ResponsePattern};

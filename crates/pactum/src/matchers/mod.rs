//! Matcher model: expected trees mixing literal values and typed matching rules.
//!
//! A [`Pattern`] is a JSON-like tree where any position may hold a literal, a
//! nested object/array, or a [`Matcher`]. Patterns are pure values; the
//! matching engine in [`crate::matching`] consumes them, and
//! [`Pattern::generate`] turns them into concrete examples for responses.
//!
//! # Module Structure
//!
//! - `types` - `Pattern` and `Matcher`
//! - `constructors` - free functions (`like`, `regex`, `array_min_like`, ...)
//! - `datetime` - `SimpleDateFormat` translation and parsing
//! - `validate` - construction-time checks (`ConfigurationError`)
//! - `generate` - example generation

mod constructors;
pub mod datetime;
mod generate;
mod types;
mod validate;

pub use constructors::{
    array_containing, array_max_like, array_min_like, array_min_max_like, datetime_generated,
    decimal, equality, from_provider_state, includes, integer, like, literal, regex, s,
};
pub(crate) use types::anchored_regex;
pub use types::{Matcher, Pattern};

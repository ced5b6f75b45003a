//! Structural matching engine.
//!
//! Pure functions over immutable inputs: an expected [`Pattern`](crate::matchers::Pattern)
//! tree against an actual value, and HTTP sections (method, path, headers,
//! query, body, status) against their expectations. Results carry every
//! mismatch with its location; matching never fails with an error.
//!
//! # Module Structure
//!
//! - `engine` - cascade-aware tree walk (`match_pattern`)
//! - `request` - per-section HTTP matching and the actual message types
//! - `query` - query-string multimap parsing
//! - `value` - type classes and numeric comparisons
//! - `mismatch` - `Mismatch` and `MatchResult`
//! - `path` - JSONPath-style location strings

mod engine;
mod mismatch;
pub(crate) mod path;
mod query;
mod request;
mod value;

pub use engine::match_pattern;
pub use mismatch::{MatchResult, Mismatch, MismatchKind};
pub use query::{encode_query, parse_query, parse_query_string, QueryParams};
pub use request::{
    match_body, match_headers, match_method, match_path, match_query, match_request,
    match_response, match_route, match_status, HeaderMap, HttpRequest, HttpResponse,
};
pub use value::TypeClass;

pub(crate) use request::is_json;

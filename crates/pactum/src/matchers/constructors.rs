//! Free-function matcher constructors.
//!
//! These never fail; invalid combinations are reported by
//! [`Pattern::validate`](super::Pattern::validate) when an interaction is
//! registered.

use super::types::{Matcher, Pattern};
use serde_json::Value;

/// A literal string.
pub fn s(value: impl Into<String>) -> Pattern {
    Matcher::Literal(Value::String(value.into())).into()
}

/// A literal of any JSON shape.
pub fn literal(value: impl Into<Value>) -> Pattern {
    Matcher::Literal(value.into()).into()
}

/// Match by structural type rather than value.
pub fn like(example: impl Into<Pattern>) -> Pattern {
    Matcher::TypeLike(example.into()).into()
}

pub fn regex(example: impl Into<String>, pattern: impl Into<String>) -> Pattern {
    Matcher::Regex {
        example: example.into(),
        pattern: pattern.into(),
    }
    .into()
}

pub fn integer(example: i64) -> Pattern {
    Matcher::Integer(example).into()
}

pub fn decimal(example: f64) -> Pattern {
    Matcher::Decimal(example).into()
}

pub fn equality(value: impl Into<Pattern>) -> Pattern {
    Matcher::Equality(value.into()).into()
}

pub fn includes(substring: impl Into<String>) -> Pattern {
    Matcher::Includes(substring.into()).into()
}

pub fn array_min_like(example: impl Into<Pattern>, min: usize) -> Pattern {
    Matcher::ArrayMinLike {
        example: example.into(),
        min,
    }
    .into()
}

pub fn array_max_like(example: impl Into<Pattern>, max: usize) -> Pattern {
    Matcher::ArrayMaxLike {
        example: example.into(),
        max,
    }
    .into()
}

pub fn array_min_max_like(example: impl Into<Pattern>, min: usize, max: usize) -> Pattern {
    Matcher::ArrayMinMaxLike {
        example: example.into(),
        min,
        max,
    }
    .into()
}

pub fn array_containing<P, I>(elements: I) -> Pattern
where
    P: Into<Pattern>,
    I: IntoIterator<Item = P>,
{
    Matcher::ArrayContaining(elements.into_iter().map(Into::into).collect()).into()
}

/// A value injected from provider-state parameters, e.g. `"${name}"`.
pub fn from_provider_state(expression: impl Into<String>, fallback: impl Into<Value>) -> Pattern {
    Matcher::ProviderStateInjected {
        expression: expression.into(),
        fallback: Some(fallback.into()),
    }
    .into()
}

/// A date/time string in a `SimpleDateFormat`-style format such as
/// `yyyy-MM-dd'T'HH:mm:ss`.
pub fn datetime_generated(example: impl Into<String>, format: impl Into<String>) -> Pattern {
    Matcher::DateTimeGenerated {
        example: example.into(),
        format: format.into(),
    }
    .into()
}

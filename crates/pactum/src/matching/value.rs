//! Type-aware comparisons over JSON values.

use serde_json::{Number, Value};
use std::fmt;

/// Dynamic type class of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl TypeClass {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeClass::Null,
            Value::Bool(_) => TypeClass::Bool,
            Value::Number(_) => TypeClass::Number,
            Value::String(_) => TypeClass::String,
            Value::Array(_) => TypeClass::Array,
            Value::Object(_) => TypeClass::Object,
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeClass::Null => "null",
            TypeClass::Bool => "boolean",
            TypeClass::Number => "number",
            TypeClass::String => "string",
            TypeClass::Array => "array",
            TypeClass::Object => "object",
        };
        f.write_str(name)
    }
}

/// Numeric equality regardless of integer/float encoding.
pub fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Whether a number is integral (a float with zero fraction counts).
pub fn is_integral(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

/// Whether a number was encoded as a fraction.
pub fn is_decimal(n: &Number) -> bool {
    n.is_f64()
}

/// Parse a header/query string as a JSON number.
pub fn parse_number(s: &str) -> Option<Number> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(Value::Number(n)) => Some(n),
        _ => None,
    }
}

/// Scalar equality with optional string coercion of the actual value.
pub fn scalars_equal(expected: &Value, actual: &Value, coerce: bool) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => numbers_equal(e, a),
        (Value::Number(e), Value::String(a)) if coerce => {
            parse_number(a).is_some_and(|n| numbers_equal(e, &n))
        }
        (Value::Bool(e), Value::String(a)) if coerce => a.trim() == e.to_string(),
        _ => expected == actual,
    }
}

/// Structural type equality with optional string coercion of the actual value.
pub fn same_type(expected: &Value, actual: &Value, coerce: bool) -> bool {
    match (expected, actual) {
        (Value::Number(_), Value::String(a)) if coerce => parse_number(a).is_some(),
        (Value::Bool(_), Value::String(a)) if coerce => {
            matches!(a.trim(), "true" | "false")
        }
        _ => TypeClass::of(expected) == TypeClass::of(actual),
    }
}

/// Coerced numeric view of an actual value.
pub fn as_number(actual: &Value, coerce: bool) -> Option<Number> {
    match actual {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) if coerce => parse_number(s),
        _ => None,
    }
}

//! Expected-tree and matcher value types.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// An expected tree: literals, nested containers, or matchers at any depth.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Pattern>),
    Object(BTreeMap<String, Pattern>),
    Matcher(Box<Matcher>),
}

/// A typed matching rule. Each kind carries what it needs both to evaluate an
/// actual value and to generate an example.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Equal after type-aware coercion (numbers compare numerically).
    Literal(Value),
    /// Same structural type as the example; cascades into children.
    TypeLike(Pattern),
    /// A string matching `pattern` in full.
    Regex { example: String, pattern: String },
    /// An integral number.
    Integer(i64),
    /// A fractional number.
    Decimal(f64),
    /// Exact equality; cancels an enclosing type cascade.
    Equality(Pattern),
    /// A string containing the substring.
    Includes(String),
    ArrayMinLike {
        example: Pattern,
        min: usize,
    },
    ArrayMaxLike {
        example: Pattern,
        max: usize,
    },
    ArrayMinMaxLike {
        example: Pattern,
        min: usize,
        max: usize,
    },
    /// Every listed element must be satisfied by some element of the actual array.
    ArrayContaining(Vec<Pattern>),
    /// Filled from provider-state parameters when the interaction is resolved.
    ProviderStateInjected {
        expression: String,
        fallback: Option<Value>,
    },
    /// A string parseable with a `SimpleDateFormat`-style format.
    DateTimeGenerated { example: String, format: String },
}

impl Matcher {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Matcher::Literal(_) => "literal",
            Matcher::TypeLike(_) => "type",
            Matcher::Regex { .. } => "regex",
            Matcher::Integer(_) => "integer",
            Matcher::Decimal(_) => "decimal",
            Matcher::Equality(_) => "equality",
            Matcher::Includes(_) => "include",
            Matcher::ArrayMinLike { .. } => "arrayMinLike",
            Matcher::ArrayMaxLike { .. } => "arrayMaxLike",
            Matcher::ArrayMinMaxLike { .. } => "arrayMinMaxLike",
            Matcher::ArrayContaining(_) => "arrayContaining",
            Matcher::ProviderStateInjected { .. } => "providerState",
            Matcher::DateTimeGenerated { .. } => "datetime",
        }
    }

    /// Array cardinality bounds and element example for the array-like kinds.
    pub fn array_bounds(&self) -> Option<(&Pattern, Option<usize>, Option<usize>)> {
        match self {
            Matcher::ArrayMinLike { example, min } => Some((example, Some(*min), None)),
            Matcher::ArrayMaxLike { example, max } => Some((example, None, Some(*max))),
            Matcher::ArrayMinMaxLike { example, min, max } => {
                Some((example, Some(*min), Some(*max)))
            }
            _ => None,
        }
    }
}

impl Pattern {
    /// Build an object pattern from `(key, pattern)` pairs.
    pub fn object<K, P, I>(entries: I) -> Self
    where
        K: Into<String>,
        P: Into<Pattern>,
        I: IntoIterator<Item = (K, P)>,
    {
        Pattern::Object(
            entries
                .into_iter()
                .map(|(k, p)| (k.into(), p.into()))
                .collect(),
        )
    }

    /// Build an array pattern.
    pub fn array<P, I>(items: I) -> Self
    where
        P: Into<Pattern>,
        I: IntoIterator<Item = P>,
    {
        Pattern::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn as_matcher(&self) -> Option<&Matcher> {
        match self {
            Pattern::Matcher(m) => Some(m),
            _ => None,
        }
    }

    /// Whether the tree contains no matchers at all.
    pub fn is_literal(&self) -> bool {
        match self {
            Pattern::Matcher(_) => false,
            Pattern::Array(items) => items.iter().all(Pattern::is_literal),
            Pattern::Object(map) => map.values().all(Pattern::is_literal),
            _ => true,
        }
    }

    /// Whether the top level is a JSON container (directly or through a matcher).
    pub fn is_container(&self) -> bool {
        match self {
            Pattern::Array(_) | Pattern::Object(_) => true,
            Pattern::Matcher(m) => match m.as_ref() {
                Matcher::Literal(v) => v.is_array() || v.is_object(),
                Matcher::TypeLike(p) | Matcher::Equality(p) => p.is_container(),
                Matcher::ArrayMinLike { .. }
                | Matcher::ArrayMaxLike { .. }
                | Matcher::ArrayMinMaxLike { .. }
                | Matcher::ArrayContaining(_) => true,
                _ => false,
            },
            _ => false,
        }
    }

    /// The scalar leaf as a JSON value, for non-container, non-matcher nodes.
    pub(crate) fn scalar(&self) -> Option<Value> {
        match self {
            Pattern::Null => Some(Value::Null),
            Pattern::Bool(b) => Some(Value::Bool(*b)),
            Pattern::Number(n) => Some(Value::Number(n.clone())),
            Pattern::String(s) => Some(Value::String(s.clone())),
            _ => None,
        }
    }
}

impl From<Value> for Pattern {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Pattern::Null,
            Value::Bool(b) => Pattern::Bool(b),
            Value::Number(n) => Pattern::Number(n),
            Value::String(s) => Pattern::String(s),
            Value::Array(items) => Pattern::Array(items.into_iter().map(Pattern::from).collect()),
            Value::Object(map) => {
                Pattern::Object(map.into_iter().map(|(k, v)| (k, Pattern::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for Pattern {
    fn from(value: &Value) -> Self {
        Pattern::from(value.clone())
    }
}

impl From<Matcher> for Pattern {
    fn from(matcher: Matcher) -> Self {
        Pattern::Matcher(Box::new(matcher))
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::String(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::String(s)
    }
}

impl From<bool> for Pattern {
    fn from(b: bool) -> Self {
        Pattern::Bool(b)
    }
}

impl From<i32> for Pattern {
    fn from(n: i32) -> Self {
        Pattern::Number(n.into())
    }
}

impl From<i64> for Pattern {
    fn from(n: i64) -> Self {
        Pattern::Number(n.into())
    }
}

impl From<u32> for Pattern {
    fn from(n: u32) -> Self {
        Pattern::Number(n.into())
    }
}

impl From<u64> for Pattern {
    fn from(n: u64) -> Self {
        Pattern::Number(n.into())
    }
}

/// Finite values become number literals. NaN and infinities have no JSON
/// form; they become a `Decimal` matcher that [`Pattern::validate`] rejects,
/// so the bad example is reported at registration.
impl From<f64> for Pattern {
    fn from(n: f64) -> Self {
        match Number::from_f64(n) {
            Some(number) => Pattern::Number(number),
            None => Matcher::Decimal(n).into(),
        }
    }
}

impl<P: Into<Pattern>> From<Vec<P>> for Pattern {
    fn from(items: Vec<P>) -> Self {
        Pattern::array(items)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Matcher(m) => write!(f, "{m}"),
            Pattern::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Pattern::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {v}", Value::String(k.clone()))?;
                }
                write!(f, "}}")
            }
            scalar => match scalar.scalar() {
                Some(v) => write!(f, "{v}"),
                None => Ok(()),
            },
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(v) => write!(f, "{v}"),
            Matcher::TypeLike(example) => write!(f, "a value like {example}"),
            Matcher::Regex { pattern, .. } => write!(f, "a string matching /{pattern}/"),
            Matcher::Integer(_) => write!(f, "an integer"),
            Matcher::Decimal(_) => write!(f, "a decimal number"),
            Matcher::Equality(value) => write!(f, "exactly {value}"),
            Matcher::Includes(sub) => write!(f, "a string including {:?}", sub),
            Matcher::ArrayMinLike { example, min } => {
                write!(f, "an array of at least {min} items like {example}")
            }
            Matcher::ArrayMaxLike { example, max } => {
                write!(f, "an array of at most {max} items like {example}")
            }
            Matcher::ArrayMinMaxLike { example, min, max } => {
                write!(f, "an array of {min} to {max} items like {example}")
            }
            Matcher::ArrayContaining(items) => {
                write!(f, "an array containing ")?;
                write!(f, "{}", Pattern::Array(items.clone()))
            }
            Matcher::ProviderStateInjected {
                expression,
                fallback,
            } => match fallback {
                Some(v) => write!(f, "{v} (from provider state {expression})"),
                None => write!(f, "provider state value {expression}"),
            },
            Matcher::DateTimeGenerated { format, .. } => {
                write!(f, "a date/time formatted as '{format}'")
            }
        }
    }
}

/// Distinct patterns kept compiled; the cache is emptied when full.
const REGEX_CACHE_LIMIT: usize = 512;

static REGEX_CACHE: Lazy<RwLock<HashMap<String, Arc<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compile `pattern` anchored to the whole input, caching the result.
pub(crate) fn anchored_regex(pattern: &str) -> Result<Arc<Regex>, regex::Error> {
    if let Some(re) = REGEX_CACHE.read().get(pattern) {
        return Ok(Arc::clone(re));
    }
    let compiled = Arc::new(Regex::new(&format!("^(?:{pattern})$"))?);
    let mut cache = REGEX_CACHE.write();
    if cache.len() >= REGEX_CACHE_LIMIT {
        cache.clear();
    }
    cache.insert(pattern.to_string(), Arc::clone(&compiled));
    Ok(compiled)
}

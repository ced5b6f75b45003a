//! Example generation: turning an expected tree into a concrete value.

use super::types::{Matcher, Pattern};
use serde_json::{Map, Number, Value};

impl Pattern {
    /// Concrete value built from literals and each matcher's example.
    pub fn generate(&self) -> Value {
        match self {
            Pattern::Array(items) => Value::Array(items.iter().map(Pattern::generate).collect()),
            Pattern::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.generate()))
                    .collect::<Map<_, _>>(),
            ),
            Pattern::Matcher(m) => m.generate(),
            scalar => scalar.scalar().unwrap_or(Value::Null),
        }
    }

    /// Generated value rendered for a header or query position.
    pub fn generate_string(&self) -> String {
        match self.generate() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

impl Matcher {
    pub fn generate(&self) -> Value {
        match self {
            Matcher::Literal(v) => v.clone(),
            Matcher::TypeLike(example) | Matcher::Equality(example) => example.generate(),
            Matcher::Regex { example, .. } => Value::String(example.clone()),
            Matcher::Integer(n) => Value::Number((*n).into()),
            Matcher::Decimal(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Matcher::Includes(sub) => Value::String(sub.clone()),
            Matcher::ArrayMinLike { example, min } => repeat(example, (*min).max(1)),
            Matcher::ArrayMaxLike { example, .. } => repeat(example, 1),
            Matcher::ArrayMinMaxLike { example, min, .. } => repeat(example, (*min).max(1)),
            Matcher::ArrayContaining(items) => {
                Value::Array(items.iter().map(Pattern::generate).collect())
            }
            Matcher::ProviderStateInjected { fallback, .. } => {
                fallback.clone().unwrap_or(Value::Null)
            }
            Matcher::DateTimeGenerated { example, .. } => Value::String(example.clone()),
        }
    }
}

fn repeat(example: &Pattern, count: usize) -> Value {
    let item = example.generate();
    Value::Array(vec![item; count])
}

#[cfg(test)]
mod tests {
    use crate::matchers::*;
    use serde_json::json;

    #[test]
    fn test_generates_response_body_from_examples() {
        let body = Pattern::object([
            ("datetime", regex("2020-01-01", "[0-9\\-]+")),
            ("name", s("Billy")),
            ("superstring", includes("foo")),
            ("id", integer(12)),
            ("accountBalance", decimal(123.76)),
            ("itemsMinMax", array_min_max_like(27, 3, 5)),
            ("itemsMin", array_min_like("thereshouldbe3ofthese", 3)),
            ("equality", equality("a thing")),
            (
                "arrayContaining",
                array_containing([
                    like("string"),
                    integer(1),
                    Pattern::object([("foo", like("bar"))]),
                ]),
            ),
        ]);

        assert_eq!(
            body.generate(),
            json!({
                "datetime": "2020-01-01",
                "name": "Billy",
                "superstring": "foo",
                "id": 12,
                "accountBalance": 123.76,
                "itemsMinMax": [27, 27, 27],
                "itemsMin": ["thereshouldbe3ofthese", "thereshouldbe3ofthese", "thereshouldbe3ofthese"],
                "equality": "a thing",
                "arrayContaining": ["string", 1, {"foo": "bar"}]
            })
        );
    }

    #[test]
    fn test_zero_min_still_generates_one_example() {
        assert_eq!(array_min_like(1, 0).generate(), json!([1]));
        assert_eq!(array_max_like("x", 4).generate(), json!(["x"]));
    }

    #[test]
    fn test_generate_string_for_headers() {
        assert_eq!(like("Bearer 1234").generate_string(), "Bearer 1234");
        assert_eq!(integer(42).generate_string(), "42");
    }
}

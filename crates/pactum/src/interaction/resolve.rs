//! Provider-state resolution: pinning `ProviderStateInjected` matchers to the
//! values supplied through provider-state parameters.

use super::types::Interaction;
use crate::error::StateResolutionError;
use crate::matchers::{Matcher, Pattern};
use serde_json::{Map, Value};

impl Interaction {
    /// Copy of the interaction with every provider-state expression resolved
    /// against the merged parameters of its states.
    pub fn resolve(&self) -> Result<Interaction, StateResolutionError> {
        let params = self.merged_params();
        let ctx = Resolver {
            params: &params,
            description: &self.description,
        };

        let mut resolved = self.clone();
        resolved.request.path = ctx.pattern(&self.request.path)?;
        for pattern in resolved.request.headers.values_mut() {
            *pattern = ctx.pattern(pattern)?;
        }
        for patterns in resolved.request.query.values_mut() {
            for pattern in patterns.iter_mut() {
                *pattern = ctx.pattern(pattern)?;
            }
        }
        if let Some(body) = resolved.request.body.as_mut() {
            *body = ctx.pattern(body)?;
        }
        for pattern in resolved.response.headers.values_mut() {
            *pattern = ctx.pattern(pattern)?;
        }
        if let Some(body) = resolved.response.body.as_mut() {
            *body = ctx.pattern(body)?;
        }
        Ok(resolved)
    }
}

impl Pattern {
    /// Resolve every provider-state expression in the tree against `params`.
    pub fn resolve(
        &self,
        params: &Map<String, Value>,
        description: &str,
    ) -> Result<Pattern, StateResolutionError> {
        Resolver {
            params,
            description,
        }
        .pattern(self)
    }
}

struct Resolver<'a> {
    params: &'a Map<String, Value>,
    description: &'a str,
}

impl Resolver<'_> {
    fn pattern(&self, pattern: &Pattern) -> Result<Pattern, StateResolutionError> {
        Ok(match pattern {
            Pattern::Array(items) => Pattern::Array(self.all(items)?),
            Pattern::Object(map) => Pattern::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.pattern(v)?)))
                    .collect::<Result<_, StateResolutionError>>()?,
            ),
            Pattern::Matcher(m) => Pattern::from(self.matcher(m)?),
            scalar => scalar.clone(),
        })
    }

    fn all(&self, items: &[Pattern]) -> Result<Vec<Pattern>, StateResolutionError> {
        items.iter().map(|p| self.pattern(p)).collect()
    }

    fn matcher(&self, matcher: &Matcher) -> Result<Matcher, StateResolutionError> {
        Ok(match matcher {
            Matcher::TypeLike(example) => Matcher::TypeLike(self.pattern(example)?),
            Matcher::Equality(value) => Matcher::Equality(self.pattern(value)?),
            Matcher::ArrayMinLike { example, min } => Matcher::ArrayMinLike {
                example: self.pattern(example)?,
                min: *min,
            },
            Matcher::ArrayMaxLike { example, max } => Matcher::ArrayMaxLike {
                example: self.pattern(example)?,
                max: *max,
            },
            Matcher::ArrayMinMaxLike { example, min, max } => Matcher::ArrayMinMaxLike {
                example: self.pattern(example)?,
                min: *min,
                max: *max,
            },
            Matcher::ArrayContaining(items) => Matcher::ArrayContaining(self.all(items)?),
            Matcher::ProviderStateInjected {
                expression,
                fallback,
            } => {
                let value = evaluate(expression, self.params)
                    .or_else(|| fallback.clone())
                    .ok_or_else(|| StateResolutionError {
                        description: self.description.to_string(),
                        expression: expression.clone(),
                    })?;
                Matcher::ProviderStateInjected {
                    expression: expression.clone(),
                    fallback: Some(value),
                }
            }
            other => other.clone(),
        })
    }
}

/// Evaluate an expression such as `${id}` or `/users/${id}/orders`.
///
/// A lone placeholder keeps the parameter's JSON type; placeholders embedded
/// in text are interpolated as strings. An expression without placeholders
/// names a parameter directly. `None` when any referenced parameter is absent.
pub fn evaluate(expression: &str, params: &Map<String, Value>) -> Option<Value> {
    let segments = split_placeholders(expression);
    match segments.as_slice() {
        [] => None,
        [Segment::Text(name)] => lookup(params, name).cloned(),
        [Segment::Placeholder(name)] => lookup(params, name).cloned(),
        _ => {
            let mut out = String::new();
            for segment in &segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Placeholder(name) => match lookup(params, name)? {
                        Value::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    },
                }
            }
            Some(Value::String(out))
        }
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn split_placeholders(expression: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = expression;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        segments.push(Segment::Placeholder(rest[start + 2..start + 2 + len].trim()));
        rest = &rest[start + 3 + len..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

/// Exact key first, then a dotted walk into nested objects.
fn lookup<'a>(params: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    if let Some(value) = params.get(name) {
        return Some(value);
    }
    let mut parts = name.split('.');
    let mut current = params.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_whole_placeholder_keeps_type() {
        let p = params(json!({"id": 42, "user": {"name": "ann"}}));
        assert_eq!(evaluate("${id}", &p), Some(json!(42)));
        assert_eq!(evaluate("${user.name}", &p), Some(json!("ann")));
        assert_eq!(evaluate("id", &p), Some(json!(42)));
    }

    #[test]
    fn test_embedded_placeholders_interpolate() {
        let p = params(json!({"id": 42, "kind": "orders"}));
        assert_eq!(
            evaluate("/users/${id}/${kind}", &p),
            Some(json!("/users/42/orders"))
        );
        assert_eq!(evaluate("/users/${missing}", &p), None);
    }

    #[test]
    fn test_resolution_uses_params_then_fallback() {
        let p = params(json!({"id": 7}));
        let body = Pattern::object([
            ("id", from_provider_state("${id}", 1)),
            ("name", from_provider_state("${name}", "fallback")),
        ]);
        let resolved = body.resolve(&p, "test").unwrap();
        assert_eq!(resolved.generate(), json!({"id": 7, "name": "fallback"}));
    }

    #[test]
    fn test_missing_param_without_fallback_fails() {
        let body = Pattern::from(Matcher::ProviderStateInjected {
            expression: "${id}".into(),
            fallback: None,
        });
        let err = body.resolve(&Map::new(), "get user").unwrap_err();
        assert_eq!(err.description, "get user");
        assert_eq!(err.expression, "${id}");
    }

    #[test]
    fn test_resolution_descends_into_matchers() {
        let p = params(json!({"id": 3}));
        let body = array_min_like(Pattern::object([("id", from_provider_state("${id}", 0))]), 2);
        let resolved = body.resolve(&p, "list").unwrap();
        assert_eq!(resolved.generate(), json!([{"id": 3}, {"id": 3}]));
    }
}

//! Conversion between pattern trees and Pact matching rules + generators.
//!
//! Writing walks a pattern and records a rule list per JSONPath; the example
//! content is the pattern's generated value. Reading walks the example content
//! and rebuilds matchers from the rules found at each path, consuming the rules
//! at one path in order so stacked matchers (`like(regex(..))`) survive.

use super::document::{Generator, MatchingRule, RuleList, Variant};
use crate::matchers::{Matcher, Pattern};
use crate::matching::path::{child_index, child_key, child_wildcard};
use serde_json::Value;
use std::collections::BTreeMap;

/// Rules and generators keyed by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RuleSet {
    pub rules: BTreeMap<String, RuleList>,
    pub generators: BTreeMap<String, Generator>,
}

impl RuleSet {
    /// Rules for `pattern` rooted at `root`.
    pub fn collect(pattern: &Pattern, root: &str) -> Self {
        let mut set = Self::default();
        set.walk(pattern, root);
        set
    }

    pub fn extend(&mut self, other: RuleSet) {
        for (path, list) in other.rules {
            match self.rules.get_mut(&path) {
                Some(existing) => existing.matchers.extend(list.matchers),
                None => {
                    self.rules.insert(path, list);
                }
            }
        }
        self.generators.extend(other.generators);
    }

    fn push(&mut self, path: &str, rule: MatchingRule) {
        self.rules
            .entry(path.to_string())
            .or_insert_with(|| RuleList::new(Vec::new()))
            .matchers
            .push(rule);
    }

    fn walk(&mut self, pattern: &Pattern, path: &str) {
        match pattern {
            Pattern::Object(map) => {
                for (key, value) in map {
                    self.walk(value, &child_key(path, key));
                }
            }
            Pattern::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(item, &child_index(path, i));
                }
            }
            Pattern::Matcher(m) => self.matcher(m, path),
            _ => {}
        }
    }

    fn matcher(&mut self, matcher: &Matcher, path: &str) {
        match matcher {
            Matcher::Literal(_) => {}
            Matcher::TypeLike(example) => {
                self.push(path, MatchingRule::Type { min: None, max: None });
                self.walk(example, path);
            }
            Matcher::Regex { pattern, .. } => self.push(
                path,
                MatchingRule::Regex {
                    regex: pattern.clone(),
                },
            ),
            Matcher::Integer(_) => self.push(path, MatchingRule::Integer),
            Matcher::Decimal(_) => self.push(path, MatchingRule::Decimal),
            Matcher::Equality(value) => {
                self.push(path, MatchingRule::Equality);
                self.walk(value, path);
            }
            Matcher::Includes(sub) => self.push(path, MatchingRule::Include { value: sub.clone() }),
            Matcher::ArrayMinLike { .. }
            | Matcher::ArrayMaxLike { .. }
            | Matcher::ArrayMinMaxLike { .. } => {
                if let Some((example, min, max)) = matcher.array_bounds() {
                    self.push(path, MatchingRule::Type { min, max });
                    self.walk(example, &child_wildcard(path));
                }
            }
            Matcher::ArrayContaining(items) => {
                let variants = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let set = RuleSet::collect(item, "$");
                        Variant {
                            index,
                            rules: set.rules,
                            generators: set.generators,
                        }
                    })
                    .collect();
                self.push(path, MatchingRule::ArrayContains { variants });
            }
            Matcher::ProviderStateInjected {
                expression,
                fallback,
            } => {
                self.generators.insert(
                    path.to_string(),
                    Generator::ProviderState {
                        expression: expression.clone(),
                        data_type: fallback.as_ref().map(data_type),
                    },
                );
            }
            Matcher::DateTimeGenerated { format, .. } => {
                self.push(
                    path,
                    MatchingRule::Datetime {
                        format: format.clone(),
                    },
                );
                self.generators.insert(
                    path.to_string(),
                    Generator::DateTime {
                        format: format.clone(),
                    },
                );
            }
        }
    }

    /// Rebuild a pattern from example content rooted at `root`.
    pub fn rebuild(&self, content: &Value, root: &str) -> Pattern {
        self.at(content, root, 0)
    }

    fn rules_at(&self, path: &str) -> &[MatchingRule] {
        self.rules
            .get(path)
            .map(|list| list.matchers.as_slice())
            .unwrap_or_default()
    }

    /// Whether any rule or generator lives at or below `path`.
    fn covers(&self, path: &str) -> bool {
        let below = |key: &String| {
            key == path
                || key
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        };
        self.rules.keys().any(below) || self.generators.keys().any(below)
    }

    fn at(&self, content: &Value, path: &str, depth: usize) -> Pattern {
        if let Some(rule) = self.rules_at(path).get(depth) {
            return self.apply(rule, content, path, depth);
        }
        match self.generators.get(path) {
            Some(Generator::ProviderState { expression, .. }) => {
                return Pattern::from(Matcher::ProviderStateInjected {
                    expression: expression.clone(),
                    fallback: Some(content.clone()),
                });
            }
            Some(Generator::DateTime { format }) => {
                return Pattern::from(Matcher::DateTimeGenerated {
                    example: as_text(content),
                    format: format.clone(),
                });
            }
            _ => {}
        }
        match content {
            Value::Object(map) => Pattern::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.at(v, &child_key(path, k), 0)))
                    .collect(),
            ),
            Value::Array(items) => Pattern::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let indexed = child_index(path, i);
                        if self.covers(&indexed) {
                            self.at(v, &indexed, 0)
                        } else {
                            self.at(v, &child_wildcard(path), 0)
                        }
                    })
                    .collect(),
            ),
            scalar => Pattern::from(scalar),
        }
    }

    fn apply(&self, rule: &MatchingRule, content: &Value, path: &str, depth: usize) -> Pattern {
        let matcher = match rule {
            MatchingRule::Type { min: None, max: None } => {
                Matcher::TypeLike(self.at(content, path, depth + 1))
            }
            MatchingRule::Type { min, max } => {
                let example = match content.as_array().and_then(|items| items.first()) {
                    Some(first) => self.at(first, &child_wildcard(path), 0),
                    None => Pattern::Null,
                };
                match (*min, *max) {
                    (Some(min), Some(max)) => Matcher::ArrayMinMaxLike { example, min, max },
                    (Some(min), None) => Matcher::ArrayMinLike { example, min },
                    (None, Some(max)) => Matcher::ArrayMaxLike { example, max },
                    (None, None) => Matcher::TypeLike(example),
                }
            }
            MatchingRule::Regex { regex } => Matcher::Regex {
                example: as_text(content),
                pattern: regex.clone(),
            },
            MatchingRule::Integer => Matcher::Integer(integer_example(content)),
            MatchingRule::Decimal => {
                Matcher::Decimal(number_text(content).as_f64().unwrap_or(0.0))
            }
            MatchingRule::Equality => Matcher::Equality(self.at(content, path, depth + 1)),
            MatchingRule::Include { value } => Matcher::Includes(value.clone()),
            MatchingRule::ArrayContains { variants } => {
                let items = content.as_array().map(Vec::as_slice).unwrap_or_default();
                Matcher::ArrayContaining(
                    variants
                        .iter()
                        .map(|variant| {
                            let set = RuleSet {
                                rules: variant.rules.clone(),
                                generators: variant.generators.clone(),
                            };
                            match items.get(variant.index) {
                                Some(example) => set.rebuild(example, "$"),
                                None => set.rebuild(&Value::Null, "$"),
                            }
                        })
                        .collect(),
                )
            }
            MatchingRule::Datetime { format } => Matcher::DateTimeGenerated {
                example: as_text(content),
                format: format.clone(),
            },
            MatchingRule::Unsupported => return self.at(content, path, depth + 1),
        };
        Pattern::from(matcher)
    }
}

/// Query rules for one parameter. Identical per-position rules collapse onto
/// the parameter name, which is how Pact keys query rules; otherwise each
/// position keeps its own `name[i]` key.
pub(crate) fn collect_query(name: &str, patterns: &[Pattern]) -> RuleSet {
    let positions: Vec<RuleSet> = patterns.iter().map(|p| RuleSet::collect(p, name)).collect();
    let uniform = positions.windows(2).all(|pair| pair[0] == pair[1]);
    if uniform {
        return positions.into_iter().next().unwrap_or_default();
    }
    let mut set = RuleSet::default();
    for (i, pattern) in patterns.iter().enumerate() {
        set.extend(RuleSet::collect(pattern, &child_index(name, i)));
    }
    set
}

/// Rebuild the patterns of one query parameter.
pub(crate) fn rebuild_query(set: &RuleSet, name: &str, values: &[String]) -> Vec<Pattern> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let indexed = child_index(name, i);
            let root = if set.covers(&indexed) { indexed } else { name.to_string() };
            set.rebuild(&Value::String(value.clone()), &root)
        })
        .collect()
}

fn data_type(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_f64() => "DECIMAL",
        Value::Number(_) => "INTEGER",
        Value::Bool(_) => "BOOLEAN",
        Value::String(_) => "STRING",
        _ => "RAW",
    }
    .to_string()
}

fn as_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric view of content that may be a string (headers, query).
fn number_text(content: &Value) -> Value {
    match content {
        Value::String(s) => serde_json::from_str(s.trim()).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Integer example from rule content: integral numbers as-is, fractional ones
/// truncated toward zero. Content that is not a number at all gives 0.
fn integer_example(content: &Value) -> i64 {
    let number = number_text(content);
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|f| f.trunc() as i64))
        .unwrap_or(0)
}

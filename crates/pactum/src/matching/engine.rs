//! Depth-first structural matcher.
//!
//! Walks an expected [`Pattern`] alongside an actual JSON value, carrying a
//! cascade mode: `Exact` compares literals by value, `Type` (entered through
//! `TypeLike` and the array-like matchers) compares literals by type class.
//! `Equality` and provider-state values switch back to `Exact`. Every
//! divergence is collected; nothing short-circuits.

use super::mismatch::{MatchResult, Mismatch, MismatchKind};
use super::path::{child_index, child_key};
use super::value::{as_number, is_decimal, is_integral, same_type, scalars_equal, TypeClass};
use crate::matchers::{anchored_regex, datetime, Matcher, Pattern};
use serde_json::Value;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cascade {
    Exact,
    Type,
}

/// Match `expected` against a JSON body value, rooted at `$`.
pub fn match_pattern(expected: &Pattern, actual: &Value) -> MatchResult {
    Engine::new(MismatchKind::Body, false).run(expected, actual, "$")
}

/// Matching context: which section mismatches belong to and whether string
/// actual values may be coerced to numbers/booleans (headers, query, path).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Engine {
    kind: MismatchKind,
    coerce: bool,
}

impl Engine {
    pub(crate) fn new(kind: MismatchKind, coerce: bool) -> Self {
        Self { kind, coerce }
    }

    pub(crate) fn run(&self, expected: &Pattern, actual: &Value, root: &str) -> MatchResult {
        let mut out = Vec::new();
        self.walk(expected, actual, root, Cascade::Exact, &mut out);
        MatchResult::from(out)
    }

    fn walk(
        &self,
        expected: &Pattern,
        actual: &Value,
        path: &str,
        mode: Cascade,
        out: &mut Vec<Mismatch>,
    ) {
        match expected {
            Pattern::Matcher(m) => self.matcher(m, actual, path, mode, out),
            Pattern::Object(map) => {
                let Some(obj) = actual.as_object() else {
                    self.type_mismatch(out, path, expected, actual, TypeClass::Object);
                    return;
                };
                for (key, pattern) in map {
                    let child = child_key(path, key);
                    match obj.get(key) {
                        Some(value) => self.walk(pattern, value, &child, mode, out),
                        None => out.push(Mismatch::new(
                            self.kind,
                            &child,
                            pattern.to_string(),
                            None,
                            format!("expected key '{key}' but it was missing"),
                        )),
                    }
                }
            }
            Pattern::Array(items) => {
                let Some(arr) = actual.as_array() else {
                    self.type_mismatch(out, path, expected, actual, TypeClass::Array);
                    return;
                };
                match mode {
                    Cascade::Type => self.type_like_array(items, arr, path, out),
                    Cascade::Exact => {
                        if items.len() != arr.len() {
                            self.push(
                                out,
                                path,
                                expected,
                                actual,
                                format!(
                                    "expected an array of {} items but got {}",
                                    items.len(),
                                    arr.len()
                                ),
                            );
                        }
                        for (i, (pattern, value)) in items.iter().zip(arr).enumerate() {
                            self.walk(pattern, value, &child_index(path, i), mode, out);
                        }
                    }
                }
            }
            scalar => {
                let Some(value) = scalar.scalar() else {
                    return;
                };
                self.scalar(&value, actual, path, mode, out);
            }
        }
    }

    fn scalar(
        &self,
        expected: &Value,
        actual: &Value,
        path: &str,
        mode: Cascade,
        out: &mut Vec<Mismatch>,
    ) {
        match mode {
            Cascade::Exact => {
                if !scalars_equal(expected, actual, self.coerce) {
                    self.push(
                        out,
                        path,
                        expected,
                        actual,
                        format!("expected {expected} but got {actual}"),
                    );
                }
            }
            // A null example carries no type information.
            Cascade::Type if expected.is_null() => {}
            Cascade::Type => {
                if !same_type(expected, actual, self.coerce) {
                    self.type_mismatch(out, path, expected, actual, TypeClass::of(expected));
                }
            }
        }
    }

    /// Each actual element against the example at the same index, or the
    /// first example element beyond the example's length.
    fn type_like_array(
        &self,
        examples: &[Pattern],
        actual: &[Value],
        path: &str,
        out: &mut Vec<Mismatch>,
    ) {
        let Some(first) = examples.first() else {
            return;
        };
        for (i, value) in actual.iter().enumerate() {
            let example = examples.get(i).unwrap_or(first);
            self.walk(example, value, &child_index(path, i), Cascade::Type, out);
        }
    }

    fn matcher(
        &self,
        matcher: &Matcher,
        actual: &Value,
        path: &str,
        mode: Cascade,
        out: &mut Vec<Mismatch>,
    ) {
        match matcher {
            Matcher::Literal(value) => self.walk(&Pattern::from(value), actual, path, mode, out),
            Matcher::TypeLike(example) => self.walk(example, actual, path, Cascade::Type, out),
            Matcher::Equality(value) => self.walk(value, actual, path, Cascade::Exact, out),
            Matcher::Regex { pattern, .. } => {
                let Some(s) = self.string_of(matcher, actual, path, out) else {
                    return;
                };
                match anchored_regex(pattern) {
                    Ok(re) if re.is_match(&s) => {}
                    Ok(_) => self.push(
                        out,
                        path,
                        matcher,
                        actual,
                        format!("expected {s:?} to match /{pattern}/"),
                    ),
                    Err(e) => self.push(
                        out,
                        path,
                        matcher,
                        actual,
                        format!("regex /{pattern}/ is invalid: {e}"),
                    ),
                }
            }
            Matcher::Integer(_) => match as_number(actual, self.coerce) {
                Some(n) if is_integral(&n) => {}
                Some(n) => self.push(
                    out,
                    path,
                    matcher,
                    actual,
                    format!("expected an integer but got {n}"),
                ),
                None => self.type_mismatch(out, path, matcher, actual, TypeClass::Number),
            },
            Matcher::Decimal(_) => match as_number(actual, self.coerce) {
                Some(n) if is_decimal(&n) => {}
                Some(n) => self.push(
                    out,
                    path,
                    matcher,
                    actual,
                    format!("expected a decimal number but got {n}"),
                ),
                None => self.type_mismatch(out, path, matcher, actual, TypeClass::Number),
            },
            Matcher::Includes(sub) => {
                let Some(s) = self.string_of(matcher, actual, path, out) else {
                    return;
                };
                if !s.contains(sub.as_str()) {
                    self.push(
                        out,
                        path,
                        matcher,
                        actual,
                        format!("expected {s:?} to include {sub:?}"),
                    );
                }
            }
            Matcher::ArrayMinLike { .. }
            | Matcher::ArrayMaxLike { .. }
            | Matcher::ArrayMinMaxLike { .. } => {
                let Some((example, min, max)) = matcher.array_bounds() else {
                    return;
                };
                let Some(arr) = actual.as_array() else {
                    self.type_mismatch(out, path, matcher, actual, TypeClass::Array);
                    return;
                };
                if let Some(min) = min.filter(|min| arr.len() < *min) {
                    self.push(
                        out,
                        path,
                        matcher,
                        actual,
                        format!(
                            "expected at least {min} items but got {}",
                            arr.len()
                        ),
                    );
                }
                if let Some(max) = max.filter(|max| arr.len() > *max) {
                    self.push(
                        out,
                        path,
                        matcher,
                        actual,
                        format!("expected at most {max} items but got {}", arr.len()),
                    );
                }
                for (i, value) in arr.iter().enumerate() {
                    self.walk(example, value, &child_index(path, i), Cascade::Type, out);
                }
            }
            Matcher::ArrayContaining(variants) => {
                let Some(arr) = actual.as_array() else {
                    self.type_mismatch(out, path, matcher, actual, TypeClass::Array);
                    return;
                };
                for (i, variant) in variants.iter().enumerate() {
                    let satisfied = arr.iter().any(|value| {
                        let mut scratch = Vec::new();
                        self.walk(variant, value, path, mode, &mut scratch);
                        scratch.is_empty()
                    });
                    if !satisfied {
                        self.push(
                            out,
                            path,
                            variant,
                            actual,
                            format!("no element matched variant {i}: {variant}"),
                        );
                    }
                }
            }
            Matcher::ProviderStateInjected {
                expression,
                fallback,
            } => match fallback {
                Some(value) => {
                    self.walk(&Pattern::from(value), actual, path, Cascade::Exact, out)
                }
                None => self.push(
                    out,
                    path,
                    matcher,
                    actual,
                    format!("provider state expression '{expression}' was never resolved"),
                ),
            },
            Matcher::DateTimeGenerated { format, .. } => {
                let Some(s) = self.string_of(matcher, actual, path, out) else {
                    return;
                };
                if !datetime::parses(&s, format) {
                    self.push(
                        out,
                        path,
                        matcher,
                        actual,
                        format!("expected {s:?} to be a date/time formatted as '{format}'"),
                    );
                }
            }
        }
    }

    /// The actual value as a string, or a recorded type mismatch.
    fn string_of(
        &self,
        matcher: &Matcher,
        actual: &Value,
        path: &str,
        out: &mut Vec<Mismatch>,
    ) -> Option<String> {
        match actual {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.type_mismatch(out, path, matcher, actual, TypeClass::String);
                None
            }
        }
    }

    fn type_mismatch(
        &self,
        out: &mut Vec<Mismatch>,
        path: &str,
        expected: &dyn Display,
        actual: &Value,
        wanted: TypeClass,
    ) {
        self.push(
            out,
            path,
            expected,
            actual,
            format!("expected a {wanted} but got a {}", TypeClass::of(actual)),
        );
    }

    fn push(
        &self,
        out: &mut Vec<Mismatch>,
        path: &str,
        expected: &dyn Display,
        actual: &Value,
        reason: String,
    ) {
        out.push(Mismatch::new(
            self.kind,
            path,
            expected.to_string(),
            Some(actual.clone()),
            reason,
        ));
    }
}

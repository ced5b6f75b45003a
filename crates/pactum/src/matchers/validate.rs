//! Construction-time validation of expected trees.

use super::datetime;
use super::types::{anchored_regex, Matcher, Pattern};
use crate::error::ConfigurationError;
use crate::matching::path::{child_index, child_key};

impl Pattern {
    /// Reject invalid matcher combinations anywhere in the tree.
    ///
    /// `root` names the tree in error messages (`$` for bodies, a header name, ...).
    pub fn validate(&self, root: &str) -> Result<(), ConfigurationError> {
        validate_at(self, root)
    }
}

fn validate_at(pattern: &Pattern, path: &str) -> Result<(), ConfigurationError> {
    match pattern {
        Pattern::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| validate_at(item, &child_index(path, i))),
        Pattern::Object(map) => map
            .iter()
            .try_for_each(|(k, v)| validate_at(v, &child_key(path, k))),
        Pattern::Matcher(m) => validate_matcher(m, path),
        _ => Ok(()),
    }
}

fn validate_matcher(matcher: &Matcher, path: &str) -> Result<(), ConfigurationError> {
    match matcher {
        Matcher::Literal(_) | Matcher::Integer(_) | Matcher::Includes(_) => Ok(()),
        Matcher::TypeLike(example) | Matcher::Equality(example) => validate_at(example, path),
        Matcher::Decimal(example) => {
            if example.is_finite() {
                Ok(())
            } else {
                Err(ConfigurationError::matcher(
                    path,
                    "decimal example must be a finite number",
                ))
            }
        }
        Matcher::Regex { example, pattern } => {
            let re = anchored_regex(pattern).map_err(|e| {
                ConfigurationError::matcher(path, format!("invalid regex /{pattern}/: {e}"))
            })?;
            if re.is_match(example) {
                Ok(())
            } else {
                Err(ConfigurationError::matcher(
                    path,
                    format!("example {example:?} does not match /{pattern}/"),
                ))
            }
        }
        Matcher::ArrayMinLike { example, .. } => validate_at(example, &child_index(path, 0)),
        Matcher::ArrayMaxLike { example, max } => {
            if *max == 0 {
                return Err(ConfigurationError::matcher(path, "max must be at least 1"));
            }
            validate_at(example, &child_index(path, 0))
        }
        Matcher::ArrayMinMaxLike { example, min, max } => {
            if *max == 0 {
                return Err(ConfigurationError::matcher(path, "max must be at least 1"));
            }
            if min > max {
                return Err(ConfigurationError::matcher(
                    path,
                    format!("min ({min}) is greater than max ({max})"),
                ));
            }
            validate_at(example, &child_index(path, 0))
        }
        Matcher::ArrayContaining(items) => {
            if items.is_empty() {
                return Err(ConfigurationError::matcher(
                    path,
                    "arrayContaining needs at least one element",
                ));
            }
            items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| validate_at(item, &child_index(path, i)))
        }
        Matcher::ProviderStateInjected { expression, .. } => {
            if expression.is_empty() {
                Err(ConfigurationError::matcher(
                    path,
                    "provider state expression is empty",
                ))
            } else {
                Ok(())
            }
        }
        Matcher::DateTimeGenerated { example, format } => {
            datetime::to_strftime(format).map_err(|e| ConfigurationError::matcher(path, e))?;
            if datetime::parses(example, format) {
                Ok(())
            } else {
                Err(ConfigurationError::matcher(
                    path,
                    format!("example {example:?} does not parse with format '{format}'"),
                ))
            }
        }
    }
}

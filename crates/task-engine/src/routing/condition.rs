//! Attribute matching: evaluates a single condition against an evaluation
//! scope (attribute bag plus live context).
//!
//! Matching is total. A missing field, a type-mismatched field, or an
//! invalid regex pattern evaluates to `false`; nothing here panics or
//! returns an error at match time. Regex patterns are instead rejected at
//! rule-save time by [`Condition::validate`].

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;
use crate::error::{Result, RoutingError};
use crate::routing::context::EvaluationScope;

/// The closed set of condition operators.
///
/// Case-sensitivity is deliberate and uniform: every string operator
/// (`equals`, `contains`, `startsWith`, `endsWith`, `in`) compares
/// case-sensitively, and nothing lower-cases implicitly. Callers wanting
/// insensitive matching normalize attributes at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Exact value equality (string, number, boolean, or list).
    Equals,
    /// Substring of a string field, or membership in a list field.
    Contains,
    /// String prefix.
    StartsWith,
    /// String suffix.
    EndsWith,
    /// Field value is one of the listed values.
    #[serde(rename = "in")]
    In,
    /// Numeric greater-than.
    Gt,
    /// Numeric less-than.
    Lt,
    /// Full regex match against a string field.
    Regex,
}

/// A single `{field, operator, value}` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: AttributeValue,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Save-time validation. Rules carrying conditions that fail here must
    /// be rejected by the creating caller so that a bad pattern can never
    /// surface as an evaluation-time failure.
    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            return Err(RoutingError::validation("condition field must not be empty"));
        }
        match self.operator {
            Operator::Regex => {
                let pattern = self.value.as_str().ok_or_else(|| {
                    RoutingError::validation(format!(
                        "regex condition on '{}' requires a string pattern",
                        self.field
                    ))
                })?;
                Regex::new(pattern).map_err(|e| {
                    RoutingError::validation(format!(
                        "invalid regex pattern for '{}': {e}",
                        self.field
                    ))
                })?;
            }
            Operator::In => {
                if self.value.as_list().is_none() {
                    return Err(RoutingError::validation(format!(
                        "'in' condition on '{}' requires a list value",
                        self.field
                    )));
                }
            }
            Operator::Gt | Operator::Lt => {
                if self.value.as_num().is_none() {
                    return Err(RoutingError::validation(format!(
                        "numeric condition on '{}' requires a number value",
                        self.field
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Evaluate this condition against a scope. Total: never panics, never
    /// errors. Unknown or mismatched fields are `false`.
    pub fn matches(&self, scope: &EvaluationScope<'_>) -> bool {
        let Some(actual) = scope.resolve(&self.field) else {
            return false;
        };

        match self.operator {
            Operator::Equals => actual == self.value,
            Operator::Contains => match (&actual, &self.value) {
                (AttributeValue::Str(s), AttributeValue::Str(needle)) => s.contains(needle),
                (AttributeValue::List(items), AttributeValue::Str(needle)) => {
                    items.iter().any(|item| item == needle)
                }
                _ => false,
            },
            Operator::StartsWith => match (&actual, &self.value) {
                (AttributeValue::Str(s), AttributeValue::Str(prefix)) => s.starts_with(prefix),
                _ => false,
            },
            Operator::EndsWith => match (&actual, &self.value) {
                (AttributeValue::Str(s), AttributeValue::Str(suffix)) => s.ends_with(suffix),
                _ => false,
            },
            Operator::In => match (&actual, &self.value) {
                (AttributeValue::Str(s), AttributeValue::List(allowed)) => {
                    allowed.iter().any(|v| v == s)
                }
                (AttributeValue::Num(n), AttributeValue::List(allowed)) => allowed
                    .iter()
                    .any(|v| v.parse::<f64>().map_or(false, |p| p == *n)),
                _ => false,
            },
            Operator::Gt => match (actual.as_num(), self.value.as_num()) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            Operator::Lt => match (actual.as_num(), self.value.as_num()) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            Operator::Regex => match (&actual, &self.value) {
                (AttributeValue::Str(s), AttributeValue::Str(pattern)) => {
                    // A pattern that slipped past save-time validation is
                    // treated as non-matching, never as a failure.
                    Regex::new(pattern).map_or(false, |re| re.is_match(s))
                }
                _ => false,
            },
        }
    }
}

//! Immutable attribute bags attached to tasks and routing contexts.
//!
//! A bag is a snapshot of what is known about a work item at creation time
//! (caller number, department, detected keywords, CRM fields). It is never
//! mutated in place; derived lookups produce a new bag via [`AttributeBag::with`]
//! or [`AttributeBag::merged`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single attribute value: scalar or list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            AttributeValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Str(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Num(n)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Num(n as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(items: Vec<String>) -> Self {
        AttributeValue::List(items)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(items: Vec<&str>) -> Self {
        AttributeValue::List(items.into_iter().map(String::from).collect())
    }
}

/// Immutable mapping from attribute key to value.
///
/// # Examples
///
/// ```
/// use switchboard_task_engine::attributes::AttributeBag;
///
/// let bag = AttributeBag::new()
///     .with("phoneNumber", "+15551234567")
///     .with("department", "sales");
///
/// assert_eq!(bag.get("department").and_then(|v| v.as_str()), Some("sales"));
/// assert!(bag.get("missing").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag(BTreeMap<String, AttributeValue>);

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a new bag with one additional (or replaced) entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    /// Derive a new bag containing this bag's entries plus `other`'s.
    /// Entries in `other` win on key collision; CRM enrichment merges on
    /// top of task attributes this way.
    pub fn merged(&self, other: &AttributeBag) -> AttributeBag {
        let mut merged = self.0.clone();
        for (key, value) in &other.0 {
            merged.insert(key.clone(), value.clone());
        }
        AttributeBag(merged)
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for AttributeBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        AttributeBag(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_derives_a_new_bag() {
        let base = AttributeBag::new().with("department", "sales");
        let derived = base.clone().with("priority", 5i64);

        assert_eq!(base.len(), 1);
        assert_eq!(derived.len(), 2);
        assert_eq!(derived.get("priority").and_then(|v| v.as_num()), Some(5.0));
    }

    #[test]
    fn merged_prefers_other_on_collision() {
        let task = AttributeBag::new().with("tier", "standard");
        let crm = AttributeBag::new().with("tier", "vip").with("accountId", "A1");

        let merged = task.merged(&crm);
        assert_eq!(merged.get("tier").and_then(|v| v.as_str()), Some("vip"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn round_trips_through_json() {
        let bag = AttributeBag::new()
            .with("phoneNumber", "+15551234567")
            .with("keywords", vec!["billing", "refund"])
            .with("priority", 3i64)
            .with("vip", true);

        let json = serde_json::to_string(&bag).unwrap();
        let back: AttributeBag = serde_json::from_str(&json).unwrap();
        assert_eq!(bag, back);
    }
}

//! Live evaluation context and the scope that resolves condition fields.

use chrono::{DateTime, Utc};

use crate::attributes::{AttributeBag, AttributeValue};

/// Live context carried alongside a task's attributes during rule
/// evaluation. All of it is produced by collaborators (telephony ingress,
/// keyword detection, CRM lookup) and passed in; the rule engine never
/// computes any of this itself.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    pub phone_number: Option<String>,
    pub keywords: Vec<String>,
    pub time: DateTime<Utc>,
    pub customer_data: Option<AttributeBag>,
}

impl RoutingContext {
    /// An empty context stamped with the current time.
    pub fn now() -> Self {
        Self {
            phone_number: None,
            keywords: Vec::new(),
            time: Utc::now(),
            customer_data: None,
        }
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_customer_data(mut self, data: AttributeBag) -> Self {
        self.customer_data = Some(data);
        self
    }
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self::now()
    }
}

/// Field resolution for condition matching.
///
/// Lookup order: the task's attribute bag first, then the well-known
/// context fields (`phoneNumber`, `keywords`, `time`), then CRM customer
/// data. The bag wins on collision so task attributes can override
/// enrichment.
pub struct EvaluationScope<'a> {
    bag: &'a AttributeBag,
    context: &'a RoutingContext,
}

impl<'a> EvaluationScope<'a> {
    pub fn new(bag: &'a AttributeBag, context: &'a RoutingContext) -> Self {
        Self { bag, context }
    }

    pub fn resolve(&self, field: &str) -> Option<AttributeValue> {
        if let Some(value) = self.bag.get(field) {
            return Some(value.clone());
        }
        match field {
            "phoneNumber" => self
                .context
                .phone_number
                .as_ref()
                .map(|p| AttributeValue::Str(p.clone())),
            "keywords" => {
                if self.context.keywords.is_empty() {
                    None
                } else {
                    Some(AttributeValue::List(self.context.keywords.clone()))
                }
            }
            "time" => Some(AttributeValue::Str(self.context.time.to_rfc3339())),
            other => self
                .context
                .customer_data
                .as_ref()
                .and_then(|data| data.get(other).cloned()),
        }
    }
}

/// Scan free text (call transcript, SMS body, voicemail transcription) for
/// catalog keywords. This is a collaborator-side helper; its output is
/// handed to the engine through [`RoutingContext::keywords`].
///
/// Detection is case-insensitive by design, unlike condition matching,
/// because transcription casing is unreliable. Returned keywords keep the
/// catalog's casing.
pub fn detect_keywords(text: &str, catalog: &[String]) -> Vec<String> {
    let haystack = text.to_lowercase();
    catalog
        .iter()
        .filter(|keyword| !keyword.is_empty() && haystack.contains(&keyword.to_lowercase()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_wins_over_context() {
        let bag = AttributeBag::new().with("phoneNumber", "+19998887777");
        let ctx = RoutingContext::now().with_phone_number("+15551234567");
        let scope = EvaluationScope::new(&bag, &ctx);

        assert_eq!(
            scope.resolve("phoneNumber"),
            Some(AttributeValue::Str("+19998887777".into()))
        );
    }

    #[test]
    fn customer_data_resolves_unknown_fields() {
        let bag = AttributeBag::new();
        let ctx = RoutingContext::now()
            .with_customer_data(AttributeBag::new().with("accountTier", "vip"));
        let scope = EvaluationScope::new(&bag, &ctx);

        assert_eq!(
            scope.resolve("accountTier"),
            Some(AttributeValue::Str("vip".into()))
        );
        assert_eq!(scope.resolve("unknown"), None);
    }

    #[test]
    fn empty_keywords_resolve_as_absent() {
        let bag = AttributeBag::new();
        let ctx = RoutingContext::now();
        let scope = EvaluationScope::new(&bag, &ctx);
        assert_eq!(scope.resolve("keywords"), None);
    }

    #[test]
    fn detects_keywords_case_insensitively() {
        let catalog = vec!["billing".to_string(), "refund".to_string()];
        let found = detect_keywords("I want a REFUND for my Billing error", &catalog);
        assert_eq!(found, vec!["billing".to_string(), "refund".to_string()]);

        assert!(detect_keywords("hello there", &catalog).is_empty());
    }
}

//! Rule definitions and the first-match-wins evaluation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::attributes::AttributeBag;
use crate::error::Result;
use crate::routing::condition::Condition;
use crate::routing::context::{EvaluationScope, RoutingContext};

/// What a matched rule does with the work item.
///
/// Each variant carries exactly the field it needs, so an action missing
/// its target is unrepresentable; validation happens at construction, not
/// inside the engine. Execution sites match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    /// Hand the call/message to a named transfer target.
    Transfer { target: String },
    /// Create a task against a queue (or workflow) destination.
    Queue { queue_sid: String },
    /// Drop the caller into an IVR sub-menu.
    Menu { menu_id: String },
}

/// A prioritized condition-to-action mapping.
///
/// Rules are totally ordered by `priority` descending, then `created_at`
/// descending for ties (the more recently created rule wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
}

impl RoutingRule {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            priority,
            enabled: true,
            conditions: Vec::new(),
            actions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Save-time validation for the whole rule. Run by whatever persists
    /// the rule; the engine assumes stored rules already passed this.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::error::RoutingError::validation(
                "rule name must not be empty",
            ));
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }
}

/// Outcome of a rule evaluation. Returned even on no-match so callers can
/// always report `{matched, rule?, actions}` structurally.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResult {
    pub matched: bool,
    pub rule: Option<RoutingRule>,
    pub actions: Vec<Action>,
}

impl RuleResult {
    pub fn matched(rule: RoutingRule) -> Self {
        let actions = rule.actions.clone();
        Self {
            matched: true,
            rule: Some(rule),
            actions,
        }
    }

    pub fn no_match() -> Self {
        Self {
            matched: false,
            rule: None,
            actions: Vec::new(),
        }
    }
}

/// Pure first-match-wins evaluator.
///
/// No side effects: the engine loads nothing, creates nothing, and mutates
/// nothing. Callers load enabled rules from the store and hand them in;
/// falling back to a default workflow on no-match is caller policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `rules` against the attributes and context, returning the
    /// single highest-priority enabled rule whose conditions all hold, and
    /// only that rule's actions.
    pub fn evaluate(
        &self,
        rules: &[RoutingRule],
        attributes: &AttributeBag,
        context: &RoutingContext,
    ) -> RuleResult {
        let scope = EvaluationScope::new(attributes, context);

        let mut ordered: Vec<&RoutingRule> = rules.iter().filter(|r| r.enabled).collect();
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.created_at.cmp(&a.created_at))
        });

        for rule in ordered {
            if rule.conditions.iter().all(|c| c.matches(&scope)) {
                debug!(rule = %rule.name, priority = rule.priority, "routing rule matched");
                return RuleResult::matched(rule.clone());
            }
        }

        debug!("no routing rule matched");
        RuleResult::no_match()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::condition::Operator;
    use chrono::Duration;

    fn sales_rule(priority: i32) -> RoutingRule {
        RoutingRule::new(format!("sales-p{priority}"), priority)
            .with_condition(Condition::new("department", Operator::Equals, "sales"))
            .with_action(Action::Queue {
                queue_sid: "QUsales".to_string(),
            })
    }

    #[test]
    fn highest_priority_matching_rule_wins() {
        let rules = vec![
            sales_rule(1),
            sales_rule(10),
            RoutingRule::new("support", 50)
                .with_condition(Condition::new("department", Operator::Equals, "support"))
                .with_action(Action::Queue {
                    queue_sid: "QUsupport".to_string(),
                }),
        ];
        let bag = AttributeBag::new().with("department", "sales");
        let result = RuleEngine::new().evaluate(&rules, &bag, &RoutingContext::now());

        assert!(result.matched);
        assert_eq!(result.rule.as_ref().unwrap().name, "sales-p10");
        assert_eq!(
            result.actions,
            vec![Action::Queue {
                queue_sid: "QUsales".to_string()
            }]
        );
    }

    #[test]
    fn priority_tie_breaks_to_newer_rule() {
        let mut older = sales_rule(10);
        older.name = "older".to_string();
        older.created_at = Utc::now() - Duration::minutes(5);
        let mut newer = sales_rule(10);
        newer.name = "newer".to_string();

        let bag = AttributeBag::new().with("department", "sales");
        let result =
            RuleEngine::new().evaluate(&[older, newer], &bag, &RoutingContext::now());
        assert_eq!(result.rule.unwrap().name, "newer");
    }

    #[test]
    fn disabled_rule_never_matches() {
        let rules = vec![sales_rule(100).disabled(), sales_rule(1)];
        let bag = AttributeBag::new().with("department", "sales");
        let result = RuleEngine::new().evaluate(&rules, &bag, &RoutingContext::now());

        assert_eq!(result.rule.unwrap().name, "sales-p1");
    }

    #[test]
    fn all_conditions_must_hold_within_a_rule() {
        let rule = sales_rule(10)
            .with_condition(Condition::new("tier", Operator::Equals, "vip"));
        let bag = AttributeBag::new().with("department", "sales");
        let result = RuleEngine::new().evaluate(&[rule], &bag, &RoutingContext::now());

        assert!(!result.matched);
        assert!(result.actions.is_empty());
    }

    #[test]
    fn no_match_returns_structured_empty_result() {
        let bag = AttributeBag::new().with("department", "billing");
        let result =
            RuleEngine::new().evaluate(&[sales_rule(10)], &bag, &RoutingContext::now());

        assert!(!result.matched);
        assert!(result.rule.is_none());
        assert!(result.actions.is_empty());
    }

    #[test]
    fn only_the_winning_rules_actions_are_returned() {
        let generic = RoutingRule::new("generic", 1)
            .with_condition(Condition::new("department", Operator::Equals, "sales"))
            .with_action(Action::Transfer {
                target: "overflow".to_string(),
            });
        let rules = vec![sales_rule(10), generic];
        let bag = AttributeBag::new().with("department", "sales");
        let result = RuleEngine::new().evaluate(&rules, &bag, &RoutingContext::now());

        assert_eq!(result.actions.len(), 1);
        assert!(matches!(result.actions[0], Action::Queue { .. }));
    }

    #[test]
    fn malformed_regex_rule_is_skipped_not_fatal() {
        // An unparseable pattern that slipped validation: that rule simply
        // does not match, and lower-priority rules still get their turn.
        let bad = RoutingRule::new("bad-regex", 100)
            .with_condition(Condition::new("phoneNumber", Operator::Regex, "([unclosed"))
            .with_action(Action::Menu {
                menu_id: "m1".to_string(),
            });
        let rules = vec![bad, sales_rule(1)];
        let bag = AttributeBag::new()
            .with("department", "sales")
            .with("phoneNumber", "+15551234567");
        let result = RuleEngine::new().evaluate(&rules, &bag, &RoutingContext::now());

        assert_eq!(result.rule.unwrap().name, "sales-p1");
    }

    #[test]
    fn action_serialization_is_tagged() {
        let action = Action::Queue {
            queue_sid: "QUsales".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "queue");
        assert_eq!(json["queueSid"], "QUsales");
    }
}

//! # Routing Rule Engine
//!
//! Decides where inbound work goes. A prioritized set of configured rules is
//! evaluated against a task's attribute bag plus live context (phone number,
//! detected keywords, time, CRM data); the first rule whose conditions all
//! hold supplies the actions to execute.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Inbound work item                      │
//! │   (attributes, phone number, keywords, CRM context)     │
//! └───────────────────────────┬─────────────────────────────┘
//!                             │
//! ┌───────────────────────────▼─────────────────────────────┐
//! │                     Rule Engine                         │
//! │   rules ordered by (priority desc, created_at desc)     │
//! │   conditions AND-ed, first match wins                   │
//! └───────────────────────────┬─────────────────────────────┘
//!                             │
//!            ┌────────────────┼─────────────────┐
//!            │                │                 │
//!     ┌──────▼──────┐  ┌──────▼──────┐   ┌──────▼──────┐
//!     │  Transfer   │  │    Queue    │   │    Menu     │
//!     │  (target)   │  │ (queue sid) │   │  (menu id)  │
//!     └─────────────┘  └─────────────┘   └─────────────┘
//! ```
//!
//! The engine is a pure decision function: it creates no tasks, sends no
//! transfers, and mutates no workers. Keyword detection and CRM enrichment
//! are produced by collaborators and passed in via [`RoutingContext`].
//!
//! Cross-rule semantics are first-match-wins, not most-specific-wins. A
//! malformed rule never fails evaluation as a whole; its conditions simply
//! do not match and the engine continues to the next rule.

pub mod condition;
pub mod context;
pub mod engine;

pub use condition::{Condition, Operator};
pub use context::{detect_keywords, EvaluationScope, RoutingContext};
pub use engine::{Action, RoutingRule, RuleEngine, RuleResult};

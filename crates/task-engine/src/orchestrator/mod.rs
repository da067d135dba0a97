//! # Engine orchestrator
//!
//! [`TaskEngine`] is the composition root: it owns the store, the rule
//! engine, the lifecycles, the availability tracker, and the upstream
//! collaborators, and exposes the operations callers drive. Construction
//! goes through [`TaskEngineBuilder`], which supplies working defaults
//! (in-memory store, loopback registry, no CRM, no event transport) so a
//! bare `builder().build()` yields a fully functional embedded engine.

pub mod core;

pub use core::{EngineStats, StatsSnapshot, TaskEngine, TaskEngineBuilder};

//! Engine configuration.
//!
//! Everything has a workable default so `TaskEngineBuilder::build` works
//! out of the box; `validate` runs once at build time and rejects values
//! the engine cannot operate with.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub routing: RoutingConfig,
    pub tasks: TaskConfig,
    pub workers: WorkerConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tasks.default_timeout_secs == 0 {
            return Err(RoutingError::configuration(
                "tasks.default_timeout_secs must be greater than zero",
            ));
        }
        if self.tasks.max_registry_attempts == 0 {
            return Err(RoutingError::configuration(
                "tasks.max_registry_attempts must be at least 1",
            ));
        }
        if self.workers.default_capacity == 0 {
            return Err(RoutingError::configuration(
                "workers.default_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Rule evaluation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Keywords scanned for (case-insensitively) when building a routing
    /// context from free text. Empty disables keyword detection.
    pub keyword_catalog: Vec<String>,
}

/// Task creation defaults and upstream call policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub default_priority: i32,
    pub default_timeout_secs: u64,
    /// Attempts per upstream registry call; only upstream failures retry.
    pub max_registry_attempts: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            default_priority: 0,
            default_timeout_secs: 120,
            max_registry_attempts: 3,
        }
    }
}

/// Worker registration defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub default_capacity: u32,
    /// Seed the standard activity catalog on engine startup.
    pub seed_default_activities: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            default_capacity: 1,
            seed_default_activities: true,
        }
    }
}

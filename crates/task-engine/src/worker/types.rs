//! Worker and activity types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strongly-typed worker identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        WorkerId(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        WorkerId(s.to_string())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for WorkerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A named availability state a worker can be in. A small enumerable
/// catalog, not a state machine; the `available` flag is what gates
/// assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_sid: String,
    pub friendly_name: String,
    pub available: bool,
}

impl Activity {
    pub fn new(activity_sid: impl Into<String>, friendly_name: impl Into<String>, available: bool) -> Self {
        Self {
            activity_sid: activity_sid.into(),
            friendly_name: friendly_name.into(),
            available,
        }
    }
}

/// The default activity catalog seeded on engine startup.
pub fn default_activities() -> Vec<Activity> {
    vec![
        Activity::new("WA-available", "Available", true),
        Activity::new("WA-busy", "Busy", false),
        Activity::new("WA-wrapup", "Wrap-up", false),
        Activity::new("WA-offline", "Offline", false),
    ]
}

/// An agent capable of handling tasks.
///
/// `available` is always derived from the referenced activity; the store
/// writes `activity_sid` and `available` in one update so no reader can
/// observe them out of sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    /// Upstream registry identifier.
    pub worker_sid: String,
    pub friendly_name: String,
    pub activity_sid: String,
    pub available: bool,
    pub skills: Vec<String>,
    pub department: Option<String>,
    /// Maximum concurrent assignments.
    pub capacity: u32,
    /// Used for least-recently-assigned ordering among eligible workers.
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(
        id: impl Into<WorkerId>,
        worker_sid: impl Into<String>,
        friendly_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            worker_sid: worker_sid.into(),
            friendly_name: friendly_name.into(),
            activity_sid: "WA-offline".to_string(),
            available: false,
            skills: Vec::new(),
            department: None,
            capacity: 1,
            last_assigned_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Predicate for eligible-worker queries. Skills are AND-ed; the
/// department, when set, must match exactly.
#[derive(Debug, Clone, Default)]
pub struct EligibilityCriteria {
    pub skills: Vec<String>,
    pub department: Option<String>,
}

impl EligibilityCriteria {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn accepts(&self, worker: &Worker) -> bool {
        self.skills.iter().all(|s| worker.skills.contains(s))
            && self
                .department
                .as_ref()
                .map_or(true, |d| worker.department.as_deref() == Some(d.as_str()))
    }
}

//! Core task and reservation types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attributes::AttributeBag;
use crate::worker::WorkerId;

/// Strongly-typed local task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        TaskId(Uuid::new_v4().to_string())
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly-typed local reservation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub String);

impl ReservationId {
    pub fn generate() -> Self {
        ReservationId(Uuid::new_v4().to_string())
    }
}

impl From<&str> for ReservationId {
    fn from(s: &str) -> Self {
        ReservationId(s.to_string())
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task assignment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Reserved,
    Assigned,
    Accepted,
    Completed,
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Canceled)
    }

    /// States a cancel is legal from.
    pub fn cancelable() -> &'static [TaskStatus] {
        &[TaskStatus::Pending, TaskStatus::Reserved, TaskStatus::Assigned]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Reserved => "RESERVED",
            TaskStatus::Assigned => "ASSIGNED",
            TaskStatus::Accepted => "ACCEPTED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Canceled => "CANCELED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "RESERVED" => Ok(TaskStatus::Reserved),
            "ASSIGNED" => Ok(TaskStatus::Assigned),
            "ACCEPTED" => Ok(TaskStatus::Accepted),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "CANCELED" => Ok(TaskStatus::Canceled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Reservation status. All states except `Pending` are terminal; task
/// completion is recorded on the task, not as a reservation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Accepted,
    Rejected,
    TimedOut,
    Canceled,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }

    /// Open means the task is spoken for: pending or accepted.
    pub fn is_open(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Accepted)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Accepted => "ACCEPTED",
            ReservationStatus::Rejected => "REJECTED",
            ReservationStatus::TimedOut => "TIMED_OUT",
            ReservationStatus::Canceled => "CANCELED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReservationStatus::Pending),
            "ACCEPTED" => Ok(ReservationStatus::Accepted),
            "REJECTED" => Ok(ReservationStatus::Rejected),
            "TIMED_OUT" => Ok(ReservationStatus::TimedOut),
            "CANCELED" => Ok(ReservationStatus::Canceled),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// Where a new task should land: a queue or a workflow in the upstream
/// registry. At least one must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDestination {
    pub queue_sid: Option<String>,
    pub workflow_sid: Option<String>,
}

impl TaskDestination {
    pub fn queue(queue_sid: impl Into<String>) -> Self {
        Self {
            queue_sid: Some(queue_sid.into()),
            workflow_sid: None,
        }
    }

    pub fn workflow(workflow_sid: impl Into<String>) -> Self {
        Self {
            queue_sid: None,
            workflow_sid: Some(workflow_sid.into()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.queue_sid.is_some() || self.workflow_sid.is_some()
    }
}

/// Local mirror of one unit of work tracked by the upstream registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Upstream registry identifier; unique, and the idempotence key for
    /// webhook-driven lookups.
    pub task_sid: String,
    pub queue_sid: Option<String>,
    pub workflow_sid: Option<String>,
    pub attributes: AttributeBag,
    pub priority: i32,
    pub timeout_secs: u64,
    pub status: TaskStatus,
    pub worker_id: Option<WorkerId>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        task_sid: impl Into<String>,
        destination: &TaskDestination,
        attributes: AttributeBag,
        priority: i32,
        timeout_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            task_sid: task_sid.into(),
            queue_sid: destination.queue_sid.clone(),
            workflow_sid: destination.workflow_sid.clone(),
            attributes,
            priority,
            timeout_secs,
            status: TaskStatus::Pending,
            worker_id: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
        }
    }
}

/// One offer of a task to one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub status: ReservationStatus,
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(task_id: TaskId, worker_id: WorkerId) -> Self {
        let now = Utc::now();
        Self {
            id: ReservationId::generate(),
            task_id,
            worker_id,
            status: ReservationStatus::Pending,
            reject_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Reserved,
            TaskStatus::Assigned,
            TaskStatus::Accepted,
            TaskStatus::Completed,
            TaskStatus::Canceled,
        ] {
            assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
        }
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Accepted,
            ReservationStatus::Rejected,
            ReservationStatus::TimedOut,
            ReservationStatus::Canceled,
        ] {
            assert_eq!(status.to_string().parse::<ReservationStatus>(), Ok(status));
        }
    }

    #[test]
    fn destination_requires_a_target() {
        assert!(!TaskDestination::default().is_resolved());
        assert!(TaskDestination::queue("QUsales").is_resolved());
        assert!(TaskDestination::workflow("WWmain").is_resolved());
    }

    #[test]
    fn open_reservation_states() {
        assert!(ReservationStatus::Pending.is_open());
        assert!(ReservationStatus::Accepted.is_open());
        assert!(!ReservationStatus::Rejected.is_open());
        assert!(!ReservationStatus::TimedOut.is_open());
    }
}

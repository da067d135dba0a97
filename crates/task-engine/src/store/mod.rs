//! # Persistent store abstraction
//!
//! The engine mirrors upstream registry state into whatever implements
//! [`TaskStore`]. The trait's one non-negotiable capability is the atomic
//! conditional transition: "move this entity to state X only if it is
//! still in one of these states", with the outcome reported truthfully so
//! the loser of a race gets an error instead of a silent no-op.
//!
//! Two backends ship with the crate: [`MemoryStore`] for tests and
//! embedded use, and [`SqliteStore`] for a durable mirror.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::routing::RoutingRule;
use crate::task::{Reservation, ReservationId, ReservationStatus, Task, TaskId, TaskStatus};
use crate::worker::{Activity, Worker, WorkerId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Field updates applied together with a task transition.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub worker_id: Option<WorkerId>,
    pub cancel_reason: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TaskChanges {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn assigned_to(worker_id: WorkerId) -> Self {
        Self {
            worker_id: Some(worker_id),
            ..Self::default()
        }
    }

    pub fn canceled(reason: impl Into<String>) -> Self {
        Self {
            cancel_reason: Some(reason.into()),
            ended_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn ended() -> Self {
        Self {
            ended_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Store operations over rules, tasks, reservations, workers, activities.
///
/// Transition methods return `Ok(Some(updated))` when the conditional
/// update committed, `Ok(None)` when the entity exists but was no longer
/// in an allowed source state, and `Err(NotFound)` when it is absent.
#[async_trait]
pub trait TaskStore: Send + Sync {
    // Routing rules
    async fn insert_rule(&self, rule: RoutingRule) -> Result<()>;
    async fn list_enabled_rules(&self) -> Result<Vec<RoutingRule>>;
    async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> Result<()>;

    // Tasks
    async fn insert_task(&self, task: Task) -> Result<()>;
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;
    async fn find_task_by_sid(&self, task_sid: &str) -> Result<Option<Task>>;
    async fn transition_task(
        &self,
        id: &TaskId,
        from: &[TaskStatus],
        to: TaskStatus,
        changes: TaskChanges,
    ) -> Result<Option<Task>>;

    // Reservations
    async fn insert_reservation(&self, reservation: Reservation) -> Result<()>;
    async fn get_reservation(&self, id: &ReservationId) -> Result<Option<Reservation>>;
    /// Most-recently-created reservation for the task in the given status.
    async fn latest_reservation(
        &self,
        task_id: &TaskId,
        status: ReservationStatus,
    ) -> Result<Option<Reservation>>;
    /// All reservations for the task in an open (pending/accepted) state.
    async fn open_reservations(&self, task_id: &TaskId) -> Result<Vec<Reservation>>;
    async fn transition_reservation(
        &self,
        id: &ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
        reject_reason: Option<String>,
    ) -> Result<Option<Reservation>>;

    // Workers
    async fn upsert_worker(&self, worker: Worker) -> Result<()>;
    async fn get_worker(&self, id: &WorkerId) -> Result<Option<Worker>>;
    async fn list_workers(&self) -> Result<Vec<Worker>>;
    /// Write `activity_sid` and the derived `available` flag as one
    /// update; callers must never observe one without the other.
    async fn set_worker_activity(
        &self,
        id: &WorkerId,
        activity_sid: &str,
        available: bool,
    ) -> Result<Worker>;
    async fn record_assignment(&self, id: &WorkerId, at: DateTime<Utc>) -> Result<()>;
    /// Open work currently held by the worker: pending reservations
    /// offered to them plus non-terminal tasks assigned to them. Counted
    /// against `Worker::capacity` by eligibility queries.
    async fn count_open_work(&self, id: &WorkerId) -> Result<u32>;

    // Activities
    async fn upsert_activity(&self, activity: Activity) -> Result<()>;
    async fn get_activity(&self, activity_sid: &str) -> Result<Option<Activity>>;
    async fn list_activities(&self) -> Result<Vec<Activity>>;
}

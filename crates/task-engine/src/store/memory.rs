//! In-memory store backend.
//!
//! Rules, workers, and activities are independent entities and live in
//! `DashMap`s. Tasks and reservations share a single mutex so conditional
//! transitions and the open-reservation invariant checks observe one
//! consistent snapshot. No lock is ever held across an await point.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{Result, RoutingError};
use crate::routing::RoutingRule;
use crate::store::{TaskChanges, TaskStore};
use crate::task::{Reservation, ReservationId, ReservationStatus, Task, TaskId, TaskStatus};
use crate::worker::{Activity, Worker, WorkerId};

#[derive(Default)]
struct TaskState {
    tasks: HashMap<String, Task>,
    reservations: HashMap<String, Reservation>,
}

/// Reference store implementation. Used by the test suite and suitable
/// for embedded single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    rules: DashMap<String, RoutingRule>,
    workers: DashMap<String, Worker>,
    activities: DashMap<String, Activity>,
    state: Mutex<TaskState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_rule(&self, rule: RoutingRule) -> Result<()> {
        self.rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    async fn list_enabled_rules(&self) -> Result<Vec<RoutingRule>> {
        Ok(self
            .rules
            .iter()
            .filter(|entry| entry.value().enabled)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> Result<()> {
        match self.rules.get_mut(rule_id) {
            Some(mut entry) => {
                entry.value_mut().enabled = enabled;
                Ok(())
            }
            None => Err(RoutingError::not_found(format!("rule {rule_id}"))),
        }
    }

    async fn insert_task(&self, task: Task) -> Result<()> {
        let mut state = self.state.lock();
        if state
            .tasks
            .values()
            .any(|t| t.task_sid == task.task_sid && t.id != task.id)
        {
            return Err(RoutingError::data_integrity(format!(
                "task with sid {} already exists",
                task.task_sid
            )));
        }
        state.tasks.insert(task.id.0.clone(), task);
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.state.lock().tasks.get(&id.0).cloned())
    }

    async fn find_task_by_sid(&self, task_sid: &str) -> Result<Option<Task>> {
        Ok(self
            .state
            .lock()
            .tasks
            .values()
            .find(|t| t.task_sid == task_sid)
            .cloned())
    }

    async fn transition_task(
        &self,
        id: &TaskId,
        from: &[TaskStatus],
        to: TaskStatus,
        changes: TaskChanges,
    ) -> Result<Option<Task>> {
        let mut state = self.state.lock();
        let task = state
            .tasks
            .get_mut(&id.0)
            .ok_or_else(|| RoutingError::not_found(format!("task {id}")))?;

        if !from.contains(&task.status) {
            return Ok(None);
        }

        task.status = to;
        task.updated_at = Utc::now();
        if let Some(worker_id) = changes.worker_id {
            task.worker_id = Some(worker_id);
        }
        if let Some(reason) = changes.cancel_reason {
            task.cancel_reason = Some(reason);
        }
        if let Some(ended_at) = changes.ended_at {
            task.ended_at = Some(ended_at);
        }
        Ok(Some(task.clone()))
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<()> {
        self.state
            .lock()
            .reservations
            .insert(reservation.id.0.clone(), reservation);
        Ok(())
    }

    async fn get_reservation(&self, id: &ReservationId) -> Result<Option<Reservation>> {
        Ok(self.state.lock().reservations.get(&id.0).cloned())
    }

    async fn latest_reservation(
        &self,
        task_id: &TaskId,
        status: ReservationStatus,
    ) -> Result<Option<Reservation>> {
        Ok(self
            .state
            .lock()
            .reservations
            .values()
            .filter(|r| &r.task_id == task_id && r.status == status)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn open_reservations(&self, task_id: &TaskId) -> Result<Vec<Reservation>> {
        Ok(self
            .state
            .lock()
            .reservations
            .values()
            .filter(|r| &r.task_id == task_id && r.status.is_open())
            .cloned()
            .collect())
    }

    async fn transition_reservation(
        &self,
        id: &ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
        reject_reason: Option<String>,
    ) -> Result<Option<Reservation>> {
        let mut state = self.state.lock();
        let reservation = state
            .reservations
            .get_mut(&id.0)
            .ok_or_else(|| RoutingError::not_found(format!("reservation {id}")))?;

        if reservation.status != from {
            return Ok(None);
        }

        reservation.status = to;
        reservation.updated_at = Utc::now();
        if let Some(reason) = reject_reason {
            reservation.reject_reason = Some(reason);
        }
        Ok(Some(reservation.clone()))
    }

    async fn upsert_worker(&self, worker: Worker) -> Result<()> {
        self.workers.insert(worker.id.0.clone(), worker);
        Ok(())
    }

    async fn get_worker(&self, id: &WorkerId) -> Result<Option<Worker>> {
        Ok(self.workers.get(&id.0).map(|entry| entry.value().clone()))
    }

    async fn list_workers(&self) -> Result<Vec<Worker>> {
        Ok(self
            .workers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn set_worker_activity(
        &self,
        id: &WorkerId,
        activity_sid: &str,
        available: bool,
    ) -> Result<Worker> {
        match self.workers.get_mut(&id.0) {
            Some(mut entry) => {
                let worker = entry.value_mut();
                worker.activity_sid = activity_sid.to_string();
                worker.available = available;
                worker.updated_at = Utc::now();
                Ok(worker.clone())
            }
            None => Err(RoutingError::not_found(format!("worker {id}"))),
        }
    }

    async fn record_assignment(&self, id: &WorkerId, at: DateTime<Utc>) -> Result<()> {
        match self.workers.get_mut(&id.0) {
            Some(mut entry) => {
                entry.value_mut().last_assigned_at = Some(at);
                Ok(())
            }
            None => Err(RoutingError::not_found(format!("worker {id}"))),
        }
    }

    async fn count_open_work(&self, id: &WorkerId) -> Result<u32> {
        let state = self.state.lock();
        let offers = state
            .reservations
            .values()
            .filter(|r| &r.worker_id == id && r.status == ReservationStatus::Pending)
            .count();
        let assigned = state
            .tasks
            .values()
            .filter(|t| t.worker_id.as_ref() == Some(id) && !t.status.is_terminal())
            .count();
        Ok((offers + assigned) as u32)
    }

    async fn upsert_activity(&self, activity: Activity) -> Result<()> {
        self.activities
            .insert(activity.activity_sid.clone(), activity);
        Ok(())
    }

    async fn get_activity(&self, activity_sid: &str) -> Result<Option<Activity>> {
        Ok(self
            .activities
            .get(activity_sid)
            .map(|entry| entry.value().clone()))
    }

    async fn list_activities(&self) -> Result<Vec<Activity>> {
        Ok(self
            .activities
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

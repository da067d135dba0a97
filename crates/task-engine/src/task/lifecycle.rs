//! Task lifecycle operations: creation, cancellation, completion, and
//! status reconciliation against the upstream mirror.

use std::sync::Arc;

use tracing::{info, warn};

use crate::attributes::AttributeBag;
use crate::error::{Result, RoutingError};
use crate::events::{EngineEvent, EventPublisher};
use crate::store::{TaskChanges, TaskStore};
use crate::task::types::{Task, TaskDestination, TaskId, TaskStatus};
use crate::task::ReservationStatus;

/// Drives the task state machine through conditional store transitions.
pub struct TaskLifecycle {
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl TaskLifecycle {
    pub fn new(store: Arc<dyn TaskStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Create the local mirror for a task the registry already knows by
    /// `task_sid`. Idempotent on the SID: a second call returns the
    /// existing mirror instead of creating a duplicate.
    pub async fn create(
        &self,
        task_sid: impl Into<String>,
        destination: &TaskDestination,
        attributes: AttributeBag,
        priority: i32,
        timeout_secs: u64,
    ) -> Result<Task> {
        if !destination.is_resolved() {
            return Err(RoutingError::invalid_target(
                "task needs a queue or workflow destination",
            ));
        }
        let task_sid = task_sid.into();
        if let Some(existing) = self.store.find_task_by_sid(&task_sid).await? {
            return Ok(existing);
        }

        let task = Task::new(&task_sid, destination, attributes, priority, timeout_secs);
        self.store.insert_task(task.clone()).await?;
        info!(task_id = %task.id, %task_sid, "task created");
        self.publisher.publish(EngineEvent::TaskCreated {
            task_id: task.id.0.clone(),
            task_sid,
        });
        Ok(task)
    }

    /// Cancel a task, recording the reason. Legal from pending, reserved,
    /// and assigned; a task that already reached a terminal state fails
    /// with `InvalidTransition`. Any still-pending reservation is canceled
    /// alongside; a reservation that a racing accept already committed is
    /// left alone, the race was decided at the store.
    pub async fn cancel(&self, id: &TaskId, reason: &str) -> Result<Task> {
        let updated = self
            .store
            .transition_task(
                id,
                TaskStatus::cancelable(),
                TaskStatus::Canceled,
                TaskChanges::canceled(reason),
            )
            .await?;

        let task = match updated {
            Some(task) => task,
            None => {
                let current = self.current_status(id).await?;
                return Err(RoutingError::invalid_transition(format!(
                    "cannot cancel task {id} from {current}"
                )));
            }
        };

        for reservation in self.store.open_reservations(id).await? {
            if reservation.status == ReservationStatus::Pending {
                let swept = self
                    .store
                    .transition_reservation(
                        &reservation.id,
                        ReservationStatus::Pending,
                        ReservationStatus::Canceled,
                        None,
                    )
                    .await?;
                if let Some(swept) = swept {
                    self.publisher.publish(EngineEvent::ReservationStatusChanged {
                        reservation_id: swept.id.0.clone(),
                        task_id: swept.task_id.0.clone(),
                        worker_id: swept.worker_id.0.clone(),
                        status: swept.status,
                    });
                }
            }
        }

        info!(task_id = %id, reason, "task canceled");
        self.publisher.publish(EngineEvent::TaskStatusChanged {
            task_id: task.id.0.clone(),
            status: task.status,
        });
        Ok(task)
    }

    /// Explicitly complete an accepted task, stamping `ended_at`.
    pub async fn complete(&self, id: &TaskId) -> Result<Task> {
        let updated = self
            .store
            .transition_task(
                id,
                &[TaskStatus::Assigned, TaskStatus::Accepted],
                TaskStatus::Completed,
                TaskChanges::ended(),
            )
            .await?;

        let task = match updated {
            Some(task) => task,
            None => {
                let current = self.current_status(id).await?;
                return Err(RoutingError::invalid_transition(format!(
                    "cannot complete task {id} from {current}"
                )));
            }
        };

        info!(task_id = %id, "task completed");
        self.publisher.publish(EngineEvent::TaskStatusChanged {
            task_id: task.id.0.clone(),
            status: task.status,
        });
        Ok(task)
    }

    /// Align the local mirror with a status reported by the registry
    /// (webhook or poll). Terminal local states are never overwritten; a
    /// mirror that cannot follow the reported status is logged and left
    /// for the next notification.
    pub async fn reconcile_status(&self, task_sid: &str, upstream: TaskStatus) -> Result<Task> {
        let task = self
            .store
            .find_task_by_sid(task_sid)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("task with sid {task_sid}")))?;

        if task.status == upstream || task.status.is_terminal() {
            return Ok(task);
        }

        match self
            .store
            .transition_task(&task.id, &[task.status], upstream, TaskChanges::none())
            .await?
        {
            Some(updated) => {
                self.publisher.publish(EngineEvent::TaskStatusChanged {
                    task_id: updated.id.0.clone(),
                    status: updated.status,
                });
                Ok(updated)
            }
            None => {
                warn!(%task_sid, "task changed underneath reconciliation, skipping");
                self.store
                    .get_task(&task.id)
                    .await?
                    .ok_or_else(|| RoutingError::not_found(format!("task {}", task.id)))
            }
        }
    }

    async fn current_status(&self, id: &TaskId) -> Result<TaskStatus> {
        Ok(self
            .store
            .get_task(id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("task {id}")))?
            .status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullPublisher;
    use crate::store::MemoryStore;

    fn lifecycle() -> (Arc<MemoryStore>, TaskLifecycle) {
        let store = Arc::new(MemoryStore::new());
        let lc = TaskLifecycle::new(store.clone(), Arc::new(NullPublisher));
        (store, lc)
    }

    #[tokio::test]
    async fn create_rejects_unresolved_destination() {
        let (_, lc) = lifecycle();
        let err = lc
            .create("WT1", &TaskDestination::default(), AttributeBag::new(), 0, 120)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn create_is_idempotent_on_sid() {
        let (_, lc) = lifecycle();
        let dest = TaskDestination::queue("QUsales");
        let first = lc
            .create("WT1", &dest, AttributeBag::new(), 0, 120)
            .await
            .unwrap();
        let second = lc
            .create("WT1", &dest, AttributeBag::new(), 5, 60)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn cancel_from_pending_records_reason() {
        let (_, lc) = lifecycle();
        let task = lc
            .create("WT1", &TaskDestination::queue("QUsales"), AttributeBag::new(), 0, 120)
            .await
            .unwrap();

        let canceled = lc.cancel(&task.id, "caller hung up").await.unwrap();
        assert_eq!(canceled.status, TaskStatus::Canceled);
        assert_eq!(canceled.cancel_reason.as_deref(), Some("caller hung up"));
        assert!(canceled.ended_at.is_some());
    }

    #[tokio::test]
    async fn cancel_from_terminal_is_invalid_transition() {
        let (store, lc) = lifecycle();
        let task = lc
            .create("WT1", &TaskDestination::queue("QUsales"), AttributeBag::new(), 0, 120)
            .await
            .unwrap();
        store
            .transition_task(
                &task.id,
                &[TaskStatus::Pending],
                TaskStatus::Accepted,
                TaskChanges::none(),
            )
            .await
            .unwrap();
        lc.complete(&task.id).await.unwrap();

        let err = lc.cancel(&task.id, "too late").await.unwrap_err();
        assert!(matches!(err, RoutingError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn reconcile_moves_nonterminal_mirror_forward() {
        let (_, lc) = lifecycle();
        let task = lc
            .create("WT1", &TaskDestination::queue("QUsales"), AttributeBag::new(), 0, 120)
            .await
            .unwrap();

        let synced = lc
            .reconcile_status(&task.task_sid, TaskStatus::Reserved)
            .await
            .unwrap();
        assert_eq!(synced.status, TaskStatus::Reserved);

        // Terminal mirrors are left alone.
        lc.cancel(&task.id, "gone").await.unwrap();
        let synced = lc
            .reconcile_status(&task.task_sid, TaskStatus::Assigned)
            .await
            .unwrap();
        assert_eq!(synced.status, TaskStatus::Canceled);
    }
}

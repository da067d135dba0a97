//! Reservation lifecycle operations.
//!
//! Every transition is an atomic conditional update keyed on the current
//! status, so a racing accept and reject on the same reservation resolve
//! to exactly one winner; the loser gets `InvalidState`.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{Result, RoutingError};
use crate::events::{EngineEvent, EventPublisher};
use crate::store::{TaskChanges, TaskStore};
use crate::task::types::{Reservation, ReservationId, ReservationStatus, TaskStatus};
use crate::worker::WorkerId;

/// Drives the reservation state machine through the store.
pub struct ReservationLifecycle {
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl ReservationLifecycle {
    pub fn new(store: Arc<dyn TaskStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Webhook ingress: the registry offered the task to a worker. Moves
    /// the task pending -> reserved and opens a pending reservation. A
    /// task that already has an open reservation is a data-integrity
    /// fault, surfaced rather than silently resolved.
    pub async fn created(
        &self,
        task_sid: &str,
        worker_id: impl Into<WorkerId>,
    ) -> Result<Reservation> {
        let worker_id = worker_id.into();
        let task = self
            .store
            .find_task_by_sid(task_sid)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("task with sid {task_sid}")))?;

        let open = self.store.open_reservations(&task.id).await?;
        if !open.is_empty() {
            error!(
                task_id = %task.id,
                open = open.len(),
                "reservation offered for a task that already has an open reservation"
            );
            return Err(RoutingError::data_integrity(format!(
                "task {} already has an open reservation",
                task.id
            )));
        }

        let reserved = self
            .store
            .transition_task(
                &task.id,
                &[TaskStatus::Pending],
                TaskStatus::Reserved,
                TaskChanges::none(),
            )
            .await?;
        if reserved.is_none() {
            return Err(RoutingError::invalid_state(format!(
                "task {} is not pending, cannot reserve",
                task.id
            )));
        }

        let reservation = Reservation::new(task.id.clone(), worker_id);
        self.store.insert_reservation(reservation.clone()).await?;

        info!(
            reservation_id = %reservation.id,
            task_id = %reservation.task_id,
            worker_id = %reservation.worker_id,
            "reservation created"
        );
        self.publish_reservation(&reservation);
        self.publisher.publish(EngineEvent::TaskStatusChanged {
            task_id: task.id.0.clone(),
            status: TaskStatus::Reserved,
        });
        Ok(reservation)
    }

    /// Accept a pending reservation. The reservation commits first, then
    /// the owning task moves to accepted with the worker recorded; if the
    /// task was canceled in between, the acceptance is compensated back
    /// out and the caller sees `InvalidState`.
    pub async fn accept(&self, id: &ReservationId) -> Result<Reservation> {
        let reservation = self
            .transition_or_invalid_state(id, ReservationStatus::Pending, ReservationStatus::Accepted, None)
            .await?;

        // Mutual exclusion: no other open reservation may exist.
        let conflicting: Vec<_> = self
            .store
            .open_reservations(&reservation.task_id)
            .await?
            .into_iter()
            .filter(|r| r.id != reservation.id)
            .collect();
        if !conflicting.is_empty() {
            error!(
                task_id = %reservation.task_id,
                reservation_id = %reservation.id,
                conflicting = conflicting.len(),
                "two open reservations on one task"
            );
            return Err(RoutingError::data_integrity(format!(
                "task {} has {} other open reservation(s)",
                reservation.task_id,
                conflicting.len()
            )));
        }

        let task = self
            .store
            .transition_task(
                &reservation.task_id,
                &[TaskStatus::Reserved, TaskStatus::Assigned],
                TaskStatus::Accepted,
                TaskChanges::assigned_to(reservation.worker_id.clone()),
            )
            .await?;
        if task.is_none() {
            // The task left the reserved state underneath us, e.g. a
            // cancel committed first. Compensate and fail cleanly.
            self.store
                .transition_reservation(
                    &reservation.id,
                    ReservationStatus::Accepted,
                    ReservationStatus::Canceled,
                    None,
                )
                .await?;
            return Err(RoutingError::invalid_state(format!(
                "task {} is no longer open for acceptance",
                reservation.task_id
            )));
        }

        // The acceptance is already committed; a missing or unregistered
        // worker record only loses the least-recently-assigned stamp.
        if let Err(e) = self
            .store
            .record_assignment(&reservation.worker_id, chrono::Utc::now())
            .await
        {
            warn!(
                worker_id = %reservation.worker_id,
                "could not stamp assignment time: {e}"
            );
        }

        info!(reservation_id = %id, worker_id = %reservation.worker_id, "reservation accepted");
        self.publish_reservation(&reservation);
        self.publisher.publish(EngineEvent::TaskStatusChanged {
            task_id: reservation.task_id.0.clone(),
            status: TaskStatus::Accepted,
        });
        Ok(reservation)
    }

    /// Reject a pending reservation with a reason. The task returns to
    /// pending so the registry can offer it again.
    pub async fn reject(&self, id: &ReservationId, reason: &str) -> Result<Reservation> {
        let reservation = self
            .transition_or_invalid_state(
                id,
                ReservationStatus::Pending,
                ReservationStatus::Rejected,
                Some(reason.to_string()),
            )
            .await?;

        self.reopen_task(&reservation).await?;
        info!(reservation_id = %id, reason, "reservation rejected");
        self.publish_reservation(&reservation);
        Ok(reservation)
    }

    /// The registry reported that the offer expired unanswered.
    pub async fn timeout(&self, id: &ReservationId) -> Result<Reservation> {
        let reservation = self
            .transition_or_invalid_state(
                id,
                ReservationStatus::Pending,
                ReservationStatus::TimedOut,
                None,
            )
            .await?;

        self.reopen_task(&reservation).await?;
        info!(reservation_id = %id, "reservation timed out");
        self.publish_reservation(&reservation);
        Ok(reservation)
    }

    /// Complete the work behind an accepted reservation. The task moves
    /// to completed; the reservation keeps accepted as its terminal
    /// status.
    pub async fn complete(
        &self,
        id: &ReservationId,
        instruction: Option<&str>,
    ) -> Result<Reservation> {
        let reservation = self
            .store
            .get_reservation(id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("reservation {id}")))?;
        if reservation.status != ReservationStatus::Accepted {
            return Err(RoutingError::invalid_state(format!(
                "reservation {id} is {}, not ACCEPTED",
                reservation.status
            )));
        }

        let task = self
            .store
            .transition_task(
                &reservation.task_id,
                &[TaskStatus::Accepted, TaskStatus::Assigned],
                TaskStatus::Completed,
                TaskChanges::ended(),
            )
            .await?;
        if task.is_none() {
            return Err(RoutingError::invalid_state(format!(
                "task {} cannot complete",
                reservation.task_id
            )));
        }

        info!(reservation_id = %id, instruction = instruction.unwrap_or(""), "reservation completed");
        self.publisher.publish(EngineEvent::TaskStatusChanged {
            task_id: reservation.task_id.0.clone(),
            status: TaskStatus::Completed,
        });
        Ok(reservation)
    }

    /// Resolve the reservation to act on when the caller only knows the
    /// task: always the most-recently-created reservation in the required
    /// source state. None means `NotFound`, never a guess at an older one.
    pub async fn latest_for_task_sid(
        &self,
        task_sid: &str,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let task = self
            .store
            .find_task_by_sid(task_sid)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("task with sid {task_sid}")))?;
        self.store
            .latest_reservation(&task.id, status)
            .await?
            .ok_or_else(|| {
                RoutingError::not_found(format!(
                    "no {status} reservation for task {}",
                    task.id
                ))
            })
    }

    async fn transition_or_invalid_state(
        &self,
        id: &ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
        reason: Option<String>,
    ) -> Result<Reservation> {
        match self
            .store
            .transition_reservation(id, from, to, reason)
            .await?
        {
            Some(reservation) => Ok(reservation),
            None => {
                let current = self
                    .store
                    .get_reservation(id)
                    .await?
                    .ok_or_else(|| RoutingError::not_found(format!("reservation {id}")))?;
                Err(RoutingError::invalid_state(format!(
                    "reservation {id} is {}, not {from}",
                    current.status
                )))
            }
        }
    }

    /// After a reject or timeout the task is re-offerable; actually
    /// re-offering is the registry's call, the mirror just reopens.
    async fn reopen_task(&self, reservation: &Reservation) -> Result<()> {
        let reopened = self
            .store
            .transition_task(
                &reservation.task_id,
                &[TaskStatus::Reserved],
                TaskStatus::Pending,
                TaskChanges::none(),
            )
            .await?;
        if let Some(task) = reopened {
            self.publisher.publish(EngineEvent::TaskStatusChanged {
                task_id: task.id.0.clone(),
                status: task.status,
            });
        }
        Ok(())
    }

    fn publish_reservation(&self, reservation: &Reservation) {
        self.publisher.publish(EngineEvent::ReservationStatusChanged {
            reservation_id: reservation.id.0.clone(),
            task_id: reservation.task_id.0.clone(),
            worker_id: reservation.worker_id.0.clone(),
            status: reservation.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeBag;
    use crate::events::NullPublisher;
    use crate::store::MemoryStore;
    use crate::task::{TaskDestination, TaskLifecycle};

    struct Fixture {
        store: Arc<MemoryStore>,
        tasks: TaskLifecycle,
        reservations: ReservationLifecycle,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(NullPublisher);
        Fixture {
            store: store.clone(),
            tasks: TaskLifecycle::new(store.clone(), publisher.clone()),
            reservations: ReservationLifecycle::new(store, publisher),
        }
    }

    async fn offered_task(fx: &Fixture) -> (crate::task::Task, Reservation) {
        let task = fx
            .tasks
            .create("WT1", &TaskDestination::queue("QUsales"), AttributeBag::new(), 0, 120)
            .await
            .unwrap();
        let reservation = fx.reservations.created("WT1", "worker-1").await.unwrap();
        (task, reservation)
    }

    #[tokio::test]
    async fn accept_moves_reservation_and_task() {
        let fx = fixture();
        fx.store
            .upsert_worker(crate::worker::Worker::new("worker-1", "WK1", "Alice"))
            .await
            .unwrap();
        let (task, reservation) = offered_task(&fx).await;

        let accepted = fx.reservations.accept(&reservation.id).await.unwrap();
        assert_eq!(accepted.status, ReservationStatus::Accepted);

        let task = fx.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Accepted);
        assert_eq!(task.worker_id, Some(WorkerId::from("worker-1")));
    }

    #[tokio::test]
    async fn accept_succeeds_for_a_worker_the_store_never_saw() {
        let fx = fixture();
        let (task, reservation) = offered_task(&fx).await;

        // No upsert_worker for "worker-1": the assignment stamp has no row
        // to land on, but the acceptance itself must still commit cleanly.
        let accepted = fx.reservations.accept(&reservation.id).await.unwrap();
        assert_eq!(accepted.status, ReservationStatus::Accepted);

        let task = fx.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Accepted);

        fx.reservations
            .complete(&reservation.id, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn double_accept_fails_with_invalid_state() {
        let fx = fixture();
        fx.store
            .upsert_worker(crate::worker::Worker::new("worker-1", "WK1", "Alice"))
            .await
            .unwrap();
        let (_, reservation) = offered_task(&fx).await;

        fx.reservations.accept(&reservation.id).await.unwrap();
        let err = fx.reservations.accept(&reservation.id).await.unwrap_err();
        assert!(matches!(err, RoutingError::InvalidState(_)));
    }

    #[tokio::test]
    async fn reject_reopens_the_task() {
        let fx = fixture();
        let (task, reservation) = offered_task(&fx).await;

        let rejected = fx
            .reservations
            .reject(&reservation.id, "on a break")
            .await
            .unwrap();
        assert_eq!(rejected.status, ReservationStatus::Rejected);
        assert_eq!(rejected.reject_reason.as_deref(), Some("on a break"));

        let task = fx.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(!task.status.is_terminal());
    }

    #[tokio::test]
    async fn timeout_reopens_the_task() {
        let fx = fixture();
        let (task, reservation) = offered_task(&fx).await;

        let timed_out = fx.reservations.timeout(&reservation.id).await.unwrap();
        assert_eq!(timed_out.status, ReservationStatus::TimedOut);

        let task = fx.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn second_offer_on_open_task_is_a_data_integrity_fault() {
        let fx = fixture();
        let _ = offered_task(&fx).await;

        let err = fx
            .reservations
            .created("WT1", "worker-2")
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::DataIntegrity(_)));
    }

    #[tokio::test]
    async fn complete_requires_an_accepted_reservation() {
        let fx = fixture();
        fx.store
            .upsert_worker(crate::worker::Worker::new("worker-1", "WK1", "Alice"))
            .await
            .unwrap();
        let (task, reservation) = offered_task(&fx).await;

        let err = fx
            .reservations
            .complete(&reservation.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidState(_)));

        fx.reservations.accept(&reservation.id).await.unwrap();
        fx.reservations
            .complete(&reservation.id, Some("wrap-up"))
            .await
            .unwrap();

        let task = fx.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.ended_at.is_some());
    }

    #[tokio::test]
    async fn by_task_selection_requires_matching_source_state() {
        let fx = fixture();
        let (_, reservation) = offered_task(&fx).await;
        fx.reservations
            .reject(&reservation.id, "busy")
            .await
            .unwrap();

        let err = fx
            .reservations
            .latest_for_task_sid("WT1", ReservationStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::NotFound(_)));
    }

    #[tokio::test]
    async fn accept_after_cancel_compensates_cleanly() {
        let fx = fixture();
        fx.store
            .upsert_worker(crate::worker::Worker::new("worker-1", "WK1", "Alice"))
            .await
            .unwrap();
        let (task, reservation) = offered_task(&fx).await;

        // Cancel commits at the task first; accept then loses.
        fx.store
            .transition_task(
                &task.id,
                &[TaskStatus::Reserved],
                TaskStatus::Canceled,
                crate::store::TaskChanges::canceled("caller gone"),
            )
            .await
            .unwrap();

        let err = fx.reservations.accept(&reservation.id).await.unwrap_err();
        assert!(matches!(err, RoutingError::InvalidState(_)));

        let reservation = fx
            .store
            .get_reservation(&reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Canceled);
    }
}

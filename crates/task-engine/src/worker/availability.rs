//! Worker availability tracking.
//!
//! Availability is never set directly. A worker moves between activities
//! and the `available` flag is derived from the activity's flag at the
//! moment of the change, written atomically with the `activity_sid`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{Result, RoutingError};
use crate::events::{EngineEvent, EventPublisher};
use crate::store::TaskStore;
use crate::worker::types::{default_activities, Activity, EligibilityCriteria, Worker, WorkerId};

/// Tracks worker activity and answers eligibility queries.
pub struct AvailabilityTracker {
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl AvailabilityTracker {
    pub fn new(store: Arc<dyn TaskStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Register or update a worker record.
    pub async fn register(&self, worker: Worker) -> Result<()> {
        info!(worker_id = %worker.id, friendly_name = %worker.friendly_name, "worker registered");
        self.store.upsert_worker(worker).await
    }

    /// Move a worker into an activity. The activity must exist in the
    /// catalog; an unknown SID is `NotFound`, not a silent offline.
    pub async fn set_activity(&self, worker_id: &WorkerId, activity_sid: &str) -> Result<Worker> {
        let activity = self
            .store
            .get_activity(activity_sid)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("activity {activity_sid}")))?;

        let worker = self
            .store
            .set_worker_activity(worker_id, &activity.activity_sid, activity.available)
            .await?;

        info!(
            worker_id = %worker.id,
            activity_sid = %worker.activity_sid,
            available = worker.available,
            "worker activity changed"
        );
        self.publisher.publish(EngineEvent::WorkerActivityChanged {
            worker_id: worker.id.0.clone(),
            activity_sid: worker.activity_sid.clone(),
            available: worker.available,
        });
        Ok(worker)
    }

    /// Workers who are available, satisfy the criteria, and have spare
    /// capacity (pending offers plus non-terminal assignments below
    /// `Worker::capacity`), ordered least-recently-assigned first.
    /// Never-assigned workers sort ahead of everyone; ties break on worker
    /// id so the order is stable.
    pub async fn eligible_workers(&self, criteria: &EligibilityCriteria) -> Result<Vec<Worker>> {
        let candidates: Vec<Worker> = self
            .store
            .list_workers()
            .await?
            .into_iter()
            .filter(|w| w.available && criteria.accepts(w))
            .collect();

        let mut workers = Vec::with_capacity(candidates.len());
        for worker in candidates {
            if self.store.count_open_work(&worker.id).await? < worker.capacity {
                workers.push(worker);
            }
        }
        workers.sort_by(|a, b| {
            a.last_assigned_at
                .cmp(&b.last_assigned_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(workers)
    }

    /// Stamp the worker's last-assignment time, pushing them to the back
    /// of the eligibility order.
    pub async fn record_assignment(&self, worker_id: &WorkerId, at: DateTime<Utc>) -> Result<()> {
        self.store.record_assignment(worker_id, at).await
    }

    /// Seed the default activity catalog. Idempotent; existing entries
    /// are overwritten with the defaults.
    pub async fn seed_default_activities(&self) -> Result<()> {
        for activity in default_activities() {
            self.store.upsert_activity(activity).await?;
        }
        Ok(())
    }

    pub async fn activities(&self) -> Result<Vec<Activity>> {
        self.store.list_activities().await
    }
}

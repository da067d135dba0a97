//! State-change event publishing.
//!
//! The publisher is an injected capability, handed to each component at
//! construction, so tests run against [`NullPublisher`] without any live
//! transport. Publishing is fire-and-forget: a failed or unobserved send
//! never blocks or rolls back the state transition that produced it.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::task::{ReservationStatus, TaskStatus};

/// Events emitted on task, reservation, and worker state changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    TaskCreated {
        task_id: String,
        task_sid: String,
    },
    TaskStatusChanged {
        task_id: String,
        status: TaskStatus,
    },
    ReservationStatusChanged {
        reservation_id: String,
        task_id: String,
        worker_id: String,
        status: ReservationStatus,
    },
    WorkerActivityChanged {
        worker_id: String,
        activity_sid: String,
        available: bool,
    },
}

/// Fire-and-forget event sink.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: EngineEvent);
}

/// Publisher backed by a tokio broadcast channel. Subscribers receive
/// every event published after they subscribe; lagging subscribers drop
/// old events rather than applying backpressure to the engine.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: EngineEvent) {
        // send only fails when there are no subscribers; that is normal.
        if let Err(e) = self.sender.send(event) {
            debug!("event dropped, no subscribers: {e}");
        }
    }
}

/// Publisher that discards everything. The default for tests.
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: EngineEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let publisher = BroadcastPublisher::new(16);
        let mut rx = publisher.subscribe();

        publisher.publish(EngineEvent::TaskCreated {
            task_id: "t1".to_string(),
            task_sid: "WT1".to_string(),
        });

        match rx.recv().await.unwrap() {
            EngineEvent::TaskCreated { task_sid, .. } => assert_eq!(task_sid, "WT1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_does_not_fail() {
        let publisher = BroadcastPublisher::new(16);
        publisher.publish(EngineEvent::WorkerActivityChanged {
            worker_id: "w1".to_string(),
            activity_sid: "WA-available".to_string(),
            available: true,
        });
    }
}

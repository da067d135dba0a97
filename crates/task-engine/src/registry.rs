//! Upstream task registry collaborator.
//!
//! The registry is the authoritative source of task and worker
//! identifiers. The engine mirrors its state locally and reconciles on
//! webhook notification; it never reimplements the registry's offer
//! broadcast or timeout enforcement.

use std::future::Future;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::attributes::AttributeBag;
use crate::error::{Result, RoutingError};
use crate::task::TaskDestination;

/// The slice of the upstream registry the engine drives directly.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Create a task upstream and return its registry SID.
    async fn create_task(
        &self,
        destination: &TaskDestination,
        attributes: &AttributeBag,
        priority: i32,
        timeout_secs: u64,
    ) -> Result<String>;

    /// Cancel a task upstream.
    async fn cancel_task(&self, task_sid: &str, reason: &str) -> Result<()>;
}

/// Registry that mints SIDs locally and performs no remote calls. Used in
/// tests and in deployments where the engine itself is authoritative.
pub struct LoopbackRegistry;

#[async_trait]
impl TaskRegistry for LoopbackRegistry {
    async fn create_task(
        &self,
        _destination: &TaskDestination,
        _attributes: &AttributeBag,
        _priority: i32,
        _timeout_secs: u64,
    ) -> Result<String> {
        Ok(format!("WT{}", Uuid::new_v4().simple()))
    }

    async fn cancel_task(&self, _task_sid: &str, _reason: &str) -> Result<()> {
        Ok(())
    }
}

/// Run an upstream call with a bounded number of attempts. Only
/// [`RoutingError::Upstream`] failures are retried; anything else is a
/// caller bug and propagates immediately.
pub async fn with_retry<T, F, Fut>(attempts: u32, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(RoutingError::Upstream(msg)) => {
                warn!(attempt, attempts, "{what} failed upstream: {msg}");
                last_err = Some(RoutingError::Upstream(msg));
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_err.unwrap_or_else(|| RoutingError::upstream(format!("{what} failed"))))
}

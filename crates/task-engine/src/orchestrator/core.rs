//! The task engine facade and its builder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::attributes::AttributeBag;
use crate::config::EngineConfig;
use crate::crm::{CrmLookup, NullCrm};
use crate::error::{Result, RoutingError};
use crate::events::{EventPublisher, NullPublisher};
use crate::registry::{with_retry, LoopbackRegistry, TaskRegistry};
use crate::routing::{detect_keywords, RoutingContext, RoutingRule, RuleEngine, RuleResult};
use crate::store::{MemoryStore, TaskStore};
use crate::task::{
    Reservation, ReservationId, ReservationLifecycle, ReservationStatus, Task, TaskDestination,
    TaskId, TaskLifecycle, TaskStatus,
};
use crate::worker::{AvailabilityTracker, EligibilityCriteria, Worker, WorkerId};

/// Monotonic operation counters. Cheap enough to bump on every call;
/// `snapshot` gives a point-in-time copy for reporting.
#[derive(Debug, Default)]
pub struct EngineStats {
    evaluations: AtomicU64,
    matches: AtomicU64,
    tasks_created: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_canceled: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub evaluations: u64,
    pub matches: u64,
    pub tasks_created: u64,
    pub tasks_completed: u64,
    pub tasks_canceled: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_canceled: self.tasks_canceled.load(Ordering::Relaxed),
        }
    }
}

/// Builder for [`TaskEngine`]. Every collaborator has a default, so tests
/// and embedded deployments configure only what they care about.
pub struct TaskEngineBuilder {
    config: EngineConfig,
    store: Arc<dyn TaskStore>,
    registry: Arc<dyn TaskRegistry>,
    crm: Arc<dyn CrmLookup>,
    publisher: Arc<dyn EventPublisher>,
}

impl Default for TaskEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            store: Arc::new(MemoryStore::new()),
            registry: Arc::new(LoopbackRegistry),
            crm: Arc::new(NullCrm),
            publisher: Arc::new(NullPublisher),
        }
    }
}

impl TaskEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn TaskRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_crm(mut self, crm: Arc<dyn CrmLookup>) -> Self {
        self.crm = crm;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Validate the configuration, wire the components, and seed the
    /// activity catalog when configured to.
    pub async fn build(self) -> Result<TaskEngine> {
        self.config.validate()?;

        let tasks = TaskLifecycle::new(self.store.clone(), self.publisher.clone());
        let reservations = ReservationLifecycle::new(self.store.clone(), self.publisher.clone());
        let availability = AvailabilityTracker::new(self.store.clone(), self.publisher.clone());

        if self.config.workers.seed_default_activities {
            availability.seed_default_activities().await?;
        }

        info!("task engine initialized");
        Ok(TaskEngine {
            config: self.config,
            store: self.store,
            registry: self.registry,
            crm: self.crm,
            rule_engine: RuleEngine::new(),
            tasks,
            reservations,
            availability,
            stats: EngineStats::default(),
        })
    }
}

/// The engine facade. All routing, lifecycle, and availability operations
/// go through here; webhook handlers and admin surfaces are thin callers.
pub struct TaskEngine {
    config: EngineConfig,
    store: Arc<dyn TaskStore>,
    registry: Arc<dyn TaskRegistry>,
    crm: Arc<dyn CrmLookup>,
    rule_engine: RuleEngine,
    tasks: TaskLifecycle,
    reservations: ReservationLifecycle,
    availability: AvailabilityTracker,
    stats: EngineStats,
}

impl TaskEngine {
    pub fn builder() -> TaskEngineBuilder {
        TaskEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // ---- Routing rules ----

    /// Persist a rule after save-time validation.
    pub async fn add_rule(&self, rule: RoutingRule) -> Result<()> {
        rule.validate()?;
        self.store.insert_rule(rule).await
    }

    pub async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> Result<()> {
        self.store.set_rule_enabled(rule_id, enabled).await
    }

    /// Evaluate the stored rule set against an inbound work item. An empty
    /// or unreadable rule store is [`RoutingError::NoRulesAvailable`],
    /// which is distinct from a successful evaluation matching nothing.
    ///
    /// A store holding only disabled rules counts as unavailable too: with
    /// every rule switched off there is no routing configuration in effect,
    /// and callers fall back the same way they would with none at all.
    pub async fn evaluate_routing(
        &self,
        attributes: &AttributeBag,
        context: &RoutingContext,
    ) -> Result<RuleResult> {
        let rules = self
            .store
            .list_enabled_rules()
            .await
            .map_err(|e| RoutingError::no_rules(format!("rule store unavailable: {e}")))?;
        if rules.is_empty() {
            return Err(RoutingError::no_rules("no enabled routing rules"));
        }

        self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
        let result = self.rule_engine.evaluate(&rules, attributes, context);
        if result.matched {
            self.stats.matches.fetch_add(1, Ordering::Relaxed);
        }
        Ok(result)
    }

    /// Assemble a routing context from the raw ingress signals: keyword
    /// detection over the free text, CRM enrichment by phone number. A
    /// CRM failure degrades to an unenriched context, it never aborts.
    pub async fn build_context(
        &self,
        phone_number: Option<&str>,
        text: Option<&str>,
    ) -> RoutingContext {
        let mut context = RoutingContext::now();

        if let Some(phone) = phone_number {
            context = context.with_phone_number(phone);
            match self.crm.lookup_by_phone(phone).await {
                Ok(Some(data)) => context = context.with_customer_data(data),
                Ok(None) => {}
                Err(e) => warn!(phone_number = phone, "CRM lookup failed, routing without enrichment: {e}"),
            }
        }

        if let Some(text) = text {
            let keywords = detect_keywords(text, &self.config.routing.keyword_catalog);
            if !keywords.is_empty() {
                context = context.with_keywords(keywords);
            }
        }

        context
    }

    // ---- Tasks ----

    /// Create a task upstream and mirror it locally, with the configured
    /// default priority and timeout.
    pub async fn create_task(
        &self,
        destination: &TaskDestination,
        attributes: AttributeBag,
    ) -> Result<Task> {
        self.create_task_with(
            destination,
            attributes,
            self.config.tasks.default_priority,
            self.config.tasks.default_timeout_secs,
        )
        .await
    }

    pub async fn create_task_with(
        &self,
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

        let attempts = self.config.tasks.max_registry_attempts;
        let task_sid = with_retry(attempts, "registry create_task", || {
            self.registry
                .create_task(destination, &attributes, priority, timeout_secs)
        })
        .await?;

        let task = self
            .tasks
            .create(task_sid, destination, attributes, priority, timeout_secs)
            .await?;
        self.stats.tasks_created.fetch_add(1, Ordering::Relaxed);
        Ok(task)
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        self.store.get_task(id).await
    }

    pub async fn find_task_by_sid(&self, task_sid: &str) -> Result<Option<Task>> {
        self.store.find_task_by_sid(task_sid).await
    }

    /// Cancel upstream first, then mirror the cancel locally. An upstream
    /// failure after retries leaves the local mirror untouched so a later
    /// retry can reconcile.
    pub async fn cancel_task(&self, id: &TaskId, reason: &str) -> Result<Task> {
        let task = self
            .store
            .get_task(id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("task {id}")))?;

        let attempts = self.config.tasks.max_registry_attempts;
        with_retry(attempts, "registry cancel_task", || {
            self.registry.cancel_task(&task.task_sid, reason)
        })
        .await?;

        let task = self.tasks.cancel(id, reason).await?;
        self.stats.tasks_canceled.fetch_add(1, Ordering::Relaxed);
        Ok(task)
    }

    pub async fn complete_task(&self, id: &TaskId) -> Result<Task> {
        let task = self.tasks.complete(id).await?;
        self.stats.tasks_completed.fetch_add(1, Ordering::Relaxed);
        Ok(task)
    }

    /// Webhook ingress: align the local mirror with an upstream-reported
    /// status.
    pub async fn reconcile_task_status(
        &self,
        task_sid: &str,
        upstream: TaskStatus,
    ) -> Result<Task> {
        self.tasks.reconcile_status(task_sid, upstream).await
    }

    // ---- Reservations ----

    /// Webhook ingress: the registry offered the task to a worker.
    pub async fn reservation_created(
        &self,
        task_sid: &str,
        worker_id: impl Into<WorkerId>,
    ) -> Result<Reservation> {
        self.reservations.created(task_sid, worker_id).await
    }

    pub async fn accept_reservation(&self, id: &ReservationId) -> Result<Reservation> {
        self.reservations.accept(id).await
    }

    pub async fn reject_reservation(
        &self,
        id: &ReservationId,
        reason: &str,
    ) -> Result<Reservation> {
        self.reservations.reject(id, reason).await
    }

    pub async fn timeout_reservation(&self, id: &ReservationId) -> Result<Reservation> {
        self.reservations.timeout(id).await
    }

    pub async fn complete_reservation(
        &self,
        id: &ReservationId,
        instruction: Option<&str>,
    ) -> Result<Reservation> {
        let reservation = self.reservations.complete(id, instruction).await?;
        self.stats.tasks_completed.fetch_add(1, Ordering::Relaxed);
        Ok(reservation)
    }

    /// By-task variants for callers that only hold the registry task SID.
    /// They act on the most recent reservation in the required source
    /// state; absence is `NotFound`.
    pub async fn accept_for_task(&self, task_sid: &str) -> Result<Reservation> {
        let reservation = self
            .reservations
            .latest_for_task_sid(task_sid, ReservationStatus::Pending)
            .await?;
        self.reservations.accept(&reservation.id).await
    }

    pub async fn reject_for_task(&self, task_sid: &str, reason: &str) -> Result<Reservation> {
        let reservation = self
            .reservations
            .latest_for_task_sid(task_sid, ReservationStatus::Pending)
            .await?;
        self.reservations.reject(&reservation.id, reason).await
    }

    pub async fn complete_for_task(
        &self,
        task_sid: &str,
        instruction: Option<&str>,
    ) -> Result<Reservation> {
        let reservation = self
            .reservations
            .latest_for_task_sid(task_sid, ReservationStatus::Accepted)
            .await?;
        self.complete_reservation(&reservation.id, instruction).await
    }

    // ---- Workers ----

    pub async fn register_worker(&self, mut worker: Worker) -> Result<()> {
        if worker.capacity == 0 {
            worker.capacity = self.config.workers.default_capacity;
        }
        self.availability.register(worker).await
    }

    pub async fn set_worker_activity(
        &self,
        worker_id: &WorkerId,
        activity_sid: &str,
    ) -> Result<Worker> {
        self.availability.set_activity(worker_id, activity_sid).await
    }

    pub async fn eligible_workers(&self, criteria: &EligibilityCriteria) -> Result<Vec<Worker>> {
        self.availability.eligible_workers(criteria).await
    }

    pub async fn record_assignment(&self, worker_id: &WorkerId, at: DateTime<Utc>) -> Result<()> {
        self.availability.record_assignment(worker_id, at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::StaticCrm;
    use crate::routing::{Action, Condition, Operator};

    async fn engine() -> TaskEngine {
        TaskEngine::builder().build().await.unwrap()
    }

    #[tokio::test]
    async fn empty_rule_store_is_no_rules_available() {
        let engine = engine().await;
        let err = engine
            .evaluate_routing(&AttributeBag::new(), &RoutingContext::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::NoRulesAvailable(_)));
    }

    #[tokio::test]
    async fn disabled_only_rule_store_is_no_rules_available() {
        let engine = engine().await;
        let rule = RoutingRule::new("sales", 10)
            .with_condition(Condition::new("department", Operator::Equals, "sales"))
            .with_action(Action::Queue {
                queue_sid: "QUsales".to_string(),
            })
            .disabled();
        let rule_id = rule.id.clone();
        engine.add_rule(rule).await.unwrap();

        let err = engine
            .evaluate_routing(
                &AttributeBag::new().with("department", "sales"),
                &RoutingContext::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::NoRulesAvailable(_)));

        // Re-enabling restores normal evaluation.
        engine.set_rule_enabled(&rule_id, true).await.unwrap();
        let result = engine
            .evaluate_routing(
                &AttributeBag::new().with("department", "sales"),
                &RoutingContext::now(),
            )
            .await
            .unwrap();
        assert!(result.matched);
    }

    #[tokio::test]
    async fn no_match_is_not_an_error() {
        let engine = engine().await;
        engine
            .add_rule(
                RoutingRule::new("sales", 10)
                    .with_condition(Condition::new("department", Operator::Equals, "sales"))
                    .with_action(Action::Queue {
                        queue_sid: "QUsales".to_string(),
                    }),
            )
            .await
            .unwrap();

        let result = engine
            .evaluate_routing(
                &AttributeBag::new().with("department", "billing"),
                &RoutingContext::now(),
            )
            .await
            .unwrap();
        assert!(!result.matched);
        assert!(result.actions.is_empty());
    }

    #[tokio::test]
    async fn invalid_rules_are_rejected_at_save_time() {
        let engine = engine().await;
        let err = engine
            .add_rule(
                RoutingRule::new("bad", 1)
                    .with_condition(Condition::new("", Operator::Equals, "x")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Validation(_)));
    }

    #[tokio::test]
    async fn context_enrichment_uses_crm_and_keywords() {
        let crm = Arc::new(StaticCrm::new());
        crm.insert(
            "+15551234567",
            AttributeBag::new().with("accountTier", "vip"),
        );
        let mut config = EngineConfig::default();
        config.routing.keyword_catalog = vec!["refund".to_string()];

        let engine = TaskEngine::builder()
            .with_config(config)
            .with_crm(crm)
            .build()
            .await
            .unwrap();

        let context = engine
            .build_context(Some("+15551234567"), Some("I want a REFUND now"))
            .await;
        assert_eq!(context.keywords, vec!["refund".to_string()]);
        assert!(context.customer_data.is_some());

        // Unknown caller: no enrichment, no failure.
        let context = engine.build_context(Some("+10000000000"), None).await;
        assert!(context.customer_data.is_none());
    }

    #[tokio::test]
    async fn create_task_mints_a_sid_and_counts_it() {
        let engine = engine().await;
        let task = engine
            .create_task(&TaskDestination::queue("QUsales"), AttributeBag::new())
            .await
            .unwrap();
        assert!(task.task_sid.starts_with("WT"));
        assert_eq!(task.priority, 0);
        assert_eq!(task.timeout_secs, 120);
        assert_eq!(engine.stats().tasks_created, 1);
    }

    #[tokio::test]
    async fn activities_are_seeded_on_build() {
        let engine = engine().await;
        engine
            .register_worker(Worker::new("w1", "WK1", "Alice"))
            .await
            .unwrap();
        let worker = engine
            .set_worker_activity(&WorkerId::from("w1"), "WA-available")
            .await
            .unwrap();
        assert!(worker.available);
    }

    #[tokio::test]
    async fn registered_worker_gets_the_default_capacity() {
        let engine = engine().await;
        engine
            .register_worker(Worker::new("w1", "WK1", "Alice").with_capacity(0))
            .await
            .unwrap();
        let worker = engine
            .eligible_workers(&EligibilityCriteria::any())
            .await
            .unwrap();
        assert!(worker.is_empty()); // still offline

        let stored = engine
            .set_worker_activity(&WorkerId::from("w1"), "WA-available")
            .await
            .unwrap();
        assert_eq!(stored.capacity, 1);
    }
}

//! # Switchboard Task Engine
//!
//! Routing, assignment, and availability for the switchboard
//! communications hub. Inbound work (calls, messages, voicemails) is
//! matched against configured routing rules; matched work becomes a task
//! mirrored from the upstream registry; tasks are offered to workers as
//! reservations and driven through their lifecycles with atomic
//! conditional state transitions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TaskEngine                           │
//! │                                                             │
//! │  ┌────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │ RuleEngine │  │ TaskLifecycle│  │ AvailabilityTracker │  │
//! │  │ (routing)  │  │ Reservation- │  │ (workers,           │  │
//! │  │            │  │ Lifecycle    │  │  activities)        │  │
//! │  └─────┬──────┘  └──────┬───────┘  └──────────┬──────────┘  │
//! │        │                │                     │             │
//! │  ┌─────▼────────────────▼─────────────────────▼──────────┐  │
//! │  │            TaskStore (memory / sqlite)                │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! │                                                             │
//! │  collaborators: TaskRegistry · CrmLookup · EventPublisher   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```
//! use switchboard_task_engine::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let engine = TaskEngine::builder().build().await?;
//!
//! engine
//!     .add_rule(
//!         RoutingRule::new("sales", 10)
//!             .with_condition(Condition::new("department", Operator::Equals, "sales"))
//!             .with_action(Action::Queue { queue_sid: "QUsales".to_string() }),
//!     )
//!     .await?;
//!
//! let attributes = AttributeBag::new().with("department", "sales");
//! let result = engine
//!     .evaluate_routing(&attributes, &RoutingContext::now())
//!     .await?;
//! assert!(result.matched);
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod config;
pub mod crm;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod registry;
pub mod routing;
pub mod store;
pub mod task;
pub mod worker;

pub use error::{Result, RoutingError};
pub use orchestrator::{TaskEngine, TaskEngineBuilder};

/// Common imports for working with the engine.
pub mod prelude {
    pub use crate::attributes::{AttributeBag, AttributeValue};
    pub use crate::config::EngineConfig;
    pub use crate::crm::{CrmLookup, NullCrm, StaticCrm};
    pub use crate::error::{Result, RoutingError};
    pub use crate::events::{BroadcastPublisher, EngineEvent, EventPublisher, NullPublisher};
    pub use crate::orchestrator::{StatsSnapshot, TaskEngine, TaskEngineBuilder};
    pub use crate::registry::{LoopbackRegistry, TaskRegistry};
    pub use crate::routing::{
        Action, Condition, Operator, RoutingContext, RoutingRule, RuleResult,
    };
    pub use crate::store::{MemoryStore, SqliteStore, TaskStore};
    pub use crate::task::{
        Reservation, ReservationId, ReservationStatus, Task, TaskDestination, TaskId, TaskStatus,
    };
    pub use crate::worker::{
        Activity, AvailabilityTracker, EligibilityCriteria, Worker, WorkerId,
    };
}

use thiserror::Error;

/// Error types for task routing and assignment operations.
///
/// Expected, recoverable-by-caller outcomes (`Validation`, `NotFound`,
/// `InvalidState`, `InvalidTransition`) are returned as values and never
/// panic. `DataIntegrity` indicates a broken invariant detected at runtime;
/// it is logged at error level and surfaced without any automatic repair.
///
/// # Examples
///
/// ```
/// use switchboard_task_engine::{RoutingError, Result};
///
/// fn accept(current: &str) -> Result<()> {
///     if current != "PENDING" {
///         return Err(RoutingError::invalid_state("reservation is not pending"));
///     }
///     Ok(())
/// }
///
/// assert!(accept("ACCEPTED").is_err());
/// ```
#[derive(Error, Debug)]
pub enum RoutingError {
    /// Malformed input to a state transition or rule definition.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Task creation was requested without a resolvable queue or workflow
    /// destination.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The requested transition is not legal from the entity's current
    /// lifecycle state (e.g. canceling a completed task).
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The operation is only legal from a specific source state and the
    /// entity is no longer in it. The losing side of a racing conditional
    /// update receives this, never a silent no-op success.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The entity, or the reservation required by a by-task operation,
    /// does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A core invariant was found violated, e.g. two open reservations on
    /// one task. Surfaced to the caller; never repaired automatically.
    #[error("Data integrity fault: {0}")]
    DataIntegrity(String),

    /// The upstream task registry or CRM collaborator failed.
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// No routing rules are configured, or the rule store is unavailable.
    /// Distinct from a successful evaluation that matched nothing.
    #[error("No routing rules available: {0}")]
    NoRulesAvailable(String),

    /// Persistent store failure. Store internals are wrapped here rather
    /// than leaked verbatim to callers.
    #[error("Store error: {0}")]
    Store(String),

    /// Engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RoutingError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_target<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn invalid_transition<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn data_integrity<S: Into<String>>(msg: S) -> Self {
        Self::DataIntegrity(msg.into())
    }

    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn no_rules<S: Into<String>>(msg: S) -> Self {
        Self::NoRulesAvailable(msg.into())
    }

    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<sqlx::Error> for RoutingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for RoutingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("serialization failure: {err}"))
    }
}

/// Result type for task engine operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

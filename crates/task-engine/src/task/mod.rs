//! # Task and Reservation lifecycles
//!
//! A task mirrors one unit of work (call, message, voicemail) tracked by
//! the upstream registry. Its lifecycle:
//!
//! ```text
//! PENDING ──► RESERVED ──► ASSIGNED ──► ACCEPTED ──► COMPLETED
//!    │            │            │
//!    └────────────┴────────────┴──────► CANCELED
//! ```
//!
//! Each offer of a task to a worker is a reservation:
//!
//! ```text
//! PENDING ──► ACCEPTED | REJECTED | TIMED_OUT | CANCELED
//! ```
//!
//! A task may accumulate many reservations over its life (sequential
//! offers), but at most one may be open (pending or accepted) at a time.
//! Every transition goes through a conditional update at the store, so a
//! racing accept and reject resolve to exactly one winner.

pub mod lifecycle;
pub mod reservation;
pub mod types;

pub use lifecycle::TaskLifecycle;
pub use reservation::ReservationLifecycle;
pub use types::{
    Reservation, ReservationId, ReservationStatus, Task, TaskDestination, TaskId, TaskStatus,
};

//! # Worker availability
//!
//! Workers are the agents tasks get offered to. Each worker points at one
//! activity from a small catalog (Available, Busy, Wrap-up, Offline); the
//! worker's `available` flag is a cached projection of that activity's
//! `available` flag, re-derived on every activity change rather than set
//! independently. Eligibility queries read the cache; the tracker is the
//! single writer.

pub mod availability;
pub mod types;

pub use availability::AvailabilityTracker;
pub use types::{default_activities, Activity, EligibilityCriteria, Worker, WorkerId};

//! Scheduling and conflict-detection backend for a tutoring platform.
//!
//! The crate answers one question reliably: can this class happen at this
//! time, and if so, book it exactly once. It covers:
//!
//! - **Availability**: recurring weekly windows per (teacher, school) plus
//!   date-specific unavailability exceptions, resolved fail-closed.
//! - **Conflict detection**: half-open interval overlap against both the
//!   teacher's and the student's existing sessions.
//! - **Booking orchestration**: per-(teacher, date) advisory locks with
//!   bounded wait, a storage-layer unique index as backstop, monotonic
//!   status lifecycle.
//! - **Recurrence expansion**: weekly/biweekly/four-weekly series
//!   materialized idempotently up to a horizon, with per-occurrence skip
//!   reporting.
//!
//! Storage goes through the repository traits in [`db`]; an in-memory
//! backend serves tests and local development, Diesel/Postgres the real
//! deployment (feature `postgres-repo`). The optional [`http`] module
//! (feature `http-server`) exposes the whole surface over REST.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;

pub use api::{
    Actor, AvailabilityId, BookingRequest, CallerRole, ExpansionReport, RecurringScheduleId,
    ScheduleId, SchoolId, SkipReason, SkippedOccurrence, StudentId, TeacherId, UnavailabilityId,
};
pub use error::{SchedulingError, SchedulingResult};
pub use models::{
    ClassSchedule, Frequency, RecurringClassSchedule, RecurringStatus, ScheduleStatus,
    TeacherAvailability, TeacherUnavailability, TimeSlot,
};
pub use services::{
    AvailabilityStatus, BookingOrchestrator, ConflictResult, RecurrenceExpander, SchedulingEvents,
};

//! Business logic on top of the repository traits.
//!
//! The modules here implement the scheduling rules; they hold no storage of
//! their own beyond the orchestrator's advisory lock registry.

pub mod availability;
pub mod booking;
pub mod conflict;
pub mod expansion;

pub use availability::{availability_for, is_available, AvailabilityStatus};
pub use booking::{BookingOrchestrator, LogEvents, SchedulingEvents, SlotLockRegistry};
pub use conflict::{check_conflict, BookingCandidate, ConflictExclusions, ConflictResult};
pub use expansion::RecurrenceExpander;

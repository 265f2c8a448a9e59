//! Domain error taxonomy for the scheduling core.
//!
//! Every conflict or validation failure is surfaced to the caller as a typed
//! variant; nothing is coerced to success. Storage-layer failures are wrapped
//! in [`SchedulingError::Repository`] and keep their structured context.

use chrono::{NaiveDate, NaiveTime};

use crate::api::{ScheduleId, SkipReason};
use crate::db::repository::RepositoryError;

/// Result type for scheduling operations.
pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Error type for the booking orchestrator, conflict detector and expander.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    /// The requested time range is empty or inverted (start >= end).
    #[error("invalid time range: start {start} must be before end {end}")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },

    /// No active availability window covers the requested range.
    #[error("teacher is not available on {date} between {start} and {end}")]
    OutsideAvailability {
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    },

    /// Availability would otherwise cover the range, but an unavailability
    /// exception blocks it on this date.
    #[error("teacher has an unavailability exception on {date}{}", reason_suffix(.reason))]
    UnavailableException {
        date: NaiveDate,
        reason: Option<String>,
    },

    /// The teacher already has a pending or confirmed session overlapping the
    /// requested range.
    #[error("teacher already has a booking overlapping {date} {start}-{end}")]
    TeacherDoubleBooked {
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        existing: ScheduleId,
    },

    /// The student already has a pending or confirmed session overlapping the
    /// requested range.
    #[error("student already has a booking overlapping {date} {start}-{end}")]
    StudentDoubleBooked {
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        existing: ScheduleId,
    },

    /// A referenced entity (schedule, recurring series) could not be resolved.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The caller's role does not permit this operation on this booking.
    #[error("caller is not permitted to {action} this booking")]
    PermissionDenied { action: &'static str },

    /// Status transitions are monotonic; this one would go backwards.
    #[error("cannot transition schedule {id} from {from} to {to}")]
    InvalidStatusTransition {
        id: ScheduleId,
        from: &'static str,
        to: &'static str,
    },

    /// Lock or transaction contention exceeded the bounded wait budget.
    /// Retryable by the caller; not a business conflict.
    #[error("concurrent booking contention for teacher {teacher_id} on {date}")]
    ConcurrencyConflict { teacher_id: i64, date: NaiveDate },

    /// The recurring series definition is structurally invalid.
    #[error("invalid recurrence configuration: {message}")]
    InvalidRecurrenceConfig { message: String },

    /// Storage-layer failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" ({})", r),
        None => String::new(),
    }
}

impl SchedulingError {
    pub fn invalid_recurrence(message: impl Into<String>) -> Self {
        Self::InvalidRecurrenceConfig {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether the caller may reasonably retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrencyConflict { .. } => true,
            Self::Repository(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Map a per-occurrence failure to a skip reason for expansion reports.
    ///
    /// Returns `None` for structural errors that must abort the whole run.
    pub fn as_skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::OutsideAvailability { .. } => Some(SkipReason::OutsideAvailability),
            Self::UnavailableException { .. } => Some(SkipReason::UnavailableException),
            Self::TeacherDoubleBooked { .. } => Some(SkipReason::TeacherDoubleBooked),
            Self::StudentDoubleBooked { .. } => Some(SkipReason::StudentDoubleBooked),
            Self::ConcurrencyConflict { .. } => Some(SkipReason::ConcurrencyConflict),
            _ => None,
        }
    }

    /// Stable machine-readable code for API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTimeRange { .. } => "INVALID_TIME_RANGE",
            Self::OutsideAvailability { .. } => "OUTSIDE_AVAILABILITY",
            Self::UnavailableException { .. } => "UNAVAILABLE_EXCEPTION",
            Self::TeacherDoubleBooked { .. } => "TEACHER_DOUBLE_BOOKED",
            Self::StudentDoubleBooked { .. } => "STUDENT_DOUBLE_BOOKED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::InvalidRecurrenceConfig { .. } => "INVALID_RECURRENCE_CONFIG",
            Self::Repository(_) => "REPOSITORY_ERROR",
        }
    }
}

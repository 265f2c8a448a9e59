//! Repository trait definitions.
//!
//! The scheduling core talks to storage exclusively through these async
//! traits, so the in-memory backend used in tests and the Diesel/Postgres
//! backend are interchangeable.

pub mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};

use crate::api::{
    AvailabilityId, RecurringScheduleId, ScheduleId, SchoolId, StudentId, TeacherId,
    UnavailabilityId,
};
use crate::models::{
    ClassSchedule, NewClassSchedule, NewRecurringClassSchedule, NewTeacherAvailability,
    NewTeacherUnavailability, RecurringClassSchedule, RecurringStatus, ScheduleStatus,
    TeacherAvailability, TeacherUnavailability,
};

/// Repository operations for availability windows and exceptions.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Insert a new availability window.
    async fn insert_availability(
        &self,
        window: NewTeacherAvailability,
    ) -> RepositoryResult<TeacherAvailability>;

    /// Soft-deactivate an availability window (never hard-deleted, so
    /// historical booking checks keep working).
    async fn deactivate_availability(&self, id: AvailabilityId) -> RepositoryResult<()>;

    /// Active windows for a teacher/school on a weekday, effective on `date`.
    async fn windows_for(
        &self,
        teacher_id: TeacherId,
        school_id: SchoolId,
        day_of_week: Weekday,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TeacherAvailability>>;

    /// Insert a new unavailability exception.
    async fn insert_unavailability(
        &self,
        exception: NewTeacherUnavailability,
    ) -> RepositoryResult<TeacherUnavailability>;

    /// Remove an unavailability exception. Rows whose date has passed are
    /// immutable and yield a validation error.
    async fn remove_unavailability(&self, id: UnavailabilityId) -> RepositoryResult<()>;

    /// All exceptions for a teacher/school on a specific date.
    async fn exceptions_on(
        &self,
        teacher_id: TeacherId,
        school_id: SchoolId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TeacherUnavailability>>;
}

/// Repository operations for booked sessions.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Insert a new session with status `pending`.
    async fn insert_schedule(&self, schedule: NewClassSchedule)
        -> RepositoryResult<ClassSchedule>;

    /// Fetch a session by id.
    async fn get_schedule(&self, id: ScheduleId) -> RepositoryResult<ClassSchedule>;

    /// Slot-blocking sessions (pending or confirmed) for a teacher on a date.
    async fn active_for_teacher_on(
        &self,
        teacher_id: TeacherId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ClassSchedule>>;

    /// Slot-blocking sessions (pending or confirmed) for a student on a date.
    async fn active_for_student_on(
        &self,
        student_id: StudentId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ClassSchedule>>;

    /// Move a session to a new date/time. Only slot-blocking sessions
    /// (pending or confirmed) can move; anything else is a
    /// `ConstraintViolation`.
    async fn update_schedule_slot(
        &self,
        id: ScheduleId,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepositoryResult<ClassSchedule>;

    /// Compare-and-set a session's status, recording the matching lifecycle
    /// timestamp. The write applies only while the current status equals
    /// `expected`; a stale `expected` is a `ConstraintViolation`, so a
    /// concurrent transition can never be overwritten after the fact.
    async fn set_schedule_status(
        &self,
        id: ScheduleId,
        expected: ScheduleStatus,
        status: ScheduleStatus,
        at: DateTime<Utc>,
    ) -> RepositoryResult<ClassSchedule>;

    /// Cancel a session, recording the reason and timestamp. Only pending or
    /// confirmed sessions can be cancelled; a session already in a terminal
    /// status is a `ConstraintViolation`.
    async fn cancel_schedule(
        &self,
        id: ScheduleId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> RepositoryResult<ClassSchedule>;

    /// Whether an instance generated from `recurring_id` already exists for
    /// this student on this date (in any status). Idempotence guard for the
    /// expander.
    async fn occurrence_exists(
        &self,
        recurring_id: RecurringScheduleId,
        date: NaiveDate,
        student_id: StudentId,
    ) -> RepositoryResult<bool>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> RepositoryResult<bool>;
}

/// Repository operations for recurring series.
#[async_trait]
pub trait RecurringRepository: Send + Sync {
    /// Insert a new recurring series with status `active` and no cursor.
    async fn insert_recurring(
        &self,
        series: NewRecurringClassSchedule,
    ) -> RepositoryResult<RecurringClassSchedule>;

    /// Fetch a series by id.
    async fn get_recurring(
        &self,
        id: RecurringScheduleId,
    ) -> RepositoryResult<RecurringClassSchedule>;

    /// Change a series' lifecycle status. Transitions follow
    /// [`RecurringStatus::can_transition_to`]; an illegal one is a
    /// `ConstraintViolation`.
    async fn set_recurring_status(
        &self,
        id: RecurringScheduleId,
        status: RecurringStatus,
    ) -> RepositoryResult<RecurringClassSchedule>;

    /// Advance the durable expansion cursor. The cursor only moves forward;
    /// an earlier date is a no-op.
    async fn advance_generation_cursor(
        &self,
        id: RecurringScheduleId,
        through: NaiveDate,
    ) -> RepositoryResult<()>;
}

/// Marker trait combining every repository concern the scheduler needs.
pub trait FullRepository:
    AvailabilityRepository + ScheduleRepository + RecurringRepository
{
}

impl<T> FullRepository for T where
    T: AvailabilityRepository + ScheduleRepository + RecurringRepository
{
}

//! Booking orchestration.
//!
//! The orchestrator is the only writer of `ClassSchedule` rows. Every write
//! happens inside a per-(teacher, date) advisory lock so the authoritative
//! conflict scan and the insert form one atomic section. The storage layer's
//! unique slot guard backstops the lock: if a constraint violation still
//! surfaces, the request is reported as retryable contention, never as a
//! silent success.
//!
//! Lifecycle writes (confirm, cancel, complete, reschedule) are
//! compare-and-set at the repository, so two callers racing on the same
//! session cannot overwrite each other's transition; the loser gets an
//! [`SchedulingError::InvalidStatusTransition`] naming the actual state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::api::{Actor, BookingRequest, CallerRole, RecurringScheduleId, ScheduleId, TeacherId};
use crate::db::repository::{FullRepository, RepositoryError};
use crate::error::{SchedulingError, SchedulingResult};
use crate::models::{ClassSchedule, NewClassSchedule, ScheduleStatus};
use crate::services::conflict::{check_conflict, BookingCandidate, ConflictExclusions};

/// Default bounded wait for the advisory lock.
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);

/// Advisory locks keyed by (teacher, date).
///
/// The outer map is only held long enough to clone the entry's lock, so
/// contention on one teacher's day never blocks bookings for another.
#[derive(Default)]
pub struct SlotLockRegistry {
    locks: Mutex<HashMap<(TeacherId, NaiveDate), Arc<tokio::sync::Mutex<()>>>>,
}

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a teacher's day, waiting at most `wait`.
    ///
    /// A timeout is contention, not a business conflict: the caller gets a
    /// retryable [`SchedulingError::ConcurrencyConflict`].
    pub async fn acquire(
        &self,
        teacher_id: TeacherId,
        date: NaiveDate,
        wait: Duration,
    ) -> SchedulingResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock();
            // A guard or waiter keeps a clone of its entry's Arc, so a strong
            // count of one marks an idle teacher-day that can be dropped.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry((teacher_id, date)).or_default().clone()
        };

        tokio::time::timeout(wait, lock.lock_owned())
            .await
            .map_err(|_| SchedulingError::ConcurrencyConflict {
                teacher_id: teacher_id.value(),
                date,
            })
    }

    /// Teacher-days currently tracked by the registry.
    pub fn tracked_slots(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Outbound notifications fired after a state change commits.
///
/// Implementations must not fail the booking: delivery is fire-and-forget and
/// happens outside the atomic section.
pub trait SchedulingEvents: Send + Sync {
    fn booking_created(&self, schedule: &ClassSchedule);
    fn booking_rescheduled(&self, schedule: &ClassSchedule);
    fn booking_cancelled(&self, schedule: &ClassSchedule);
}

/// Default event sink: structured log lines only.
pub struct LogEvents;

impl SchedulingEvents for LogEvents {
    fn booking_created(&self, schedule: &ClassSchedule) {
        log::info!(
            "booked session {} teacher={} student={} on {} {}-{}",
            schedule.id,
            schedule.teacher_id,
            schedule.student_id,
            schedule.scheduled_date,
            schedule.start_time,
            schedule.end_time
        );
    }

    fn booking_rescheduled(&self, schedule: &ClassSchedule) {
        log::info!(
            "rescheduled session {} to {} {}-{}",
            schedule.id,
            schedule.scheduled_date,
            schedule.start_time,
            schedule.end_time
        );
    }

    fn booking_cancelled(&self, schedule: &ClassSchedule) {
        log::info!(
            "cancelled session {} reason={:?}",
            schedule.id,
            schedule.cancellation_reason
        );
    }
}

/// Coordinates conflict checking, locking and persistence for bookings.
pub struct BookingOrchestrator {
    repo: Arc<dyn FullRepository>,
    locks: SlotLockRegistry,
    events: Arc<dyn SchedulingEvents>,
    lock_wait: Duration,
}

impl BookingOrchestrator {
    pub fn new(repo: Arc<dyn FullRepository>) -> Self {
        Self {
            repo,
            locks: SlotLockRegistry::new(),
            events: Arc::new(LogEvents),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// Replace the event sink.
    pub fn with_events(mut self, events: Arc<dyn SchedulingEvents>) -> Self {
        self.events = events;
        self
    }

    /// Override the bounded lock wait (tests use a short one).
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Book a single session.
    ///
    /// The caller must be a party to the booking or a school admin. On
    /// success the session is persisted as `pending` and a created event
    /// fires after the lock is released.
    pub async fn book(
        &self,
        actor: &Actor,
        request: &BookingRequest,
    ) -> SchedulingResult<ClassSchedule> {
        ensure_request_party(actor, request)?;
        let candidate = BookingCandidate::from_request(request)?;
        let schedule = self
            .insert_checked(&candidate, ConflictExclusions::default(), None)
            .await?;
        self.events.booking_created(&schedule);
        Ok(schedule)
    }

    /// Book one generated instance of a recurring series.
    ///
    /// Sibling instances of the series on the same date are excluded from the
    /// teacher-overlap scan so a group class does not collide with itself.
    pub(crate) async fn book_for_series(
        &self,
        candidate: &BookingCandidate,
        recurring_id: RecurringScheduleId,
    ) -> SchedulingResult<ClassSchedule> {
        let schedule = self
            .insert_checked(
                candidate,
                ConflictExclusions::series(recurring_id),
                Some(recurring_id),
            )
            .await?;
        self.events.booking_created(&schedule);
        Ok(schedule)
    }

    /// Move a pending or confirmed session to a new slot.
    pub async fn reschedule(
        &self,
        actor: &Actor,
        schedule_id: ScheduleId,
        new_date: NaiveDate,
        new_start: NaiveTime,
        new_end: NaiveTime,
    ) -> SchedulingResult<ClassSchedule> {
        let existing = self.get(schedule_id).await?;
        ensure_booking_party(actor, &existing, "reschedule")?;
        if !existing.status.blocks_slot() {
            return Err(SchedulingError::InvalidStatusTransition {
                id: existing.id,
                from: existing.status.as_str(),
                to: "rescheduled",
            });
        }

        let candidate = BookingCandidate::new(
            existing.teacher_id,
            existing.student_id,
            existing.school_id,
            new_date,
            new_start,
            new_end,
        )?;

        let _guard = self
            .locks
            .acquire(candidate.teacher_id, candidate.date, self.lock_wait)
            .await?;
        check_conflict(
            self.repo.as_ref(),
            &candidate,
            ConflictExclusions::reschedule(schedule_id),
        )
        .await?
        .into_result(&candidate)?;

        let updated = match self
            .repo
            .update_schedule_slot(schedule_id, new_date, new_start, new_end)
            .await
        {
            Ok(updated) => updated,
            Err(e) => return Err(self.transition_error(e, schedule_id, "rescheduled").await),
        };
        drop(_guard);

        self.events.booking_rescheduled(&updated);
        Ok(updated)
    }

    /// Cancel a session, freeing its slot.
    pub async fn cancel(
        &self,
        actor: &Actor,
        schedule_id: ScheduleId,
        reason: Option<String>,
    ) -> SchedulingResult<ClassSchedule> {
        let existing = self.get(schedule_id).await?;
        ensure_booking_party(actor, &existing, "cancel")?;
        existing.ensure_transition(ScheduleStatus::Cancelled)?;

        let cancelled = match self
            .repo
            .cancel_schedule(schedule_id, reason, Utc::now())
            .await
        {
            Ok(cancelled) => cancelled,
            Err(e) => return Err(self.transition_error(e, schedule_id, "cancelled").await),
        };
        self.events.booking_cancelled(&cancelled);
        Ok(cancelled)
    }

    /// Confirm a pending session.
    pub async fn confirm(
        &self,
        actor: &Actor,
        schedule_id: ScheduleId,
    ) -> SchedulingResult<ClassSchedule> {
        let existing = self.get(schedule_id).await?;
        ensure_booking_party(actor, &existing, "confirm")?;
        existing.ensure_transition(ScheduleStatus::Confirmed)?;

        match self
            .repo
            .set_schedule_status(
                schedule_id,
                existing.status,
                ScheduleStatus::Confirmed,
                Utc::now(),
            )
            .await
        {
            Ok(confirmed) => Ok(confirmed),
            Err(e) => Err(self.transition_error(e, schedule_id, "confirmed").await),
        }
    }

    /// Mark a confirmed session as completed. Teachers and admins only.
    pub async fn complete(
        &self,
        actor: &Actor,
        schedule_id: ScheduleId,
    ) -> SchedulingResult<ClassSchedule> {
        let existing = self.get(schedule_id).await?;
        match actor.role {
            CallerRole::SchoolAdmin => {}
            CallerRole::Teacher if actor.id == existing.teacher_id.value() => {}
            _ => return Err(SchedulingError::PermissionDenied { action: "complete" }),
        }
        existing.ensure_transition(ScheduleStatus::Completed)?;

        match self
            .repo
            .set_schedule_status(
                schedule_id,
                existing.status,
                ScheduleStatus::Completed,
                Utc::now(),
            )
            .await
        {
            Ok(completed) => Ok(completed),
            Err(e) => Err(self.transition_error(e, schedule_id, "completed").await),
        }
    }

    /// Translate a rejected lifecycle write.
    ///
    /// A constraint violation here means the session changed between our read
    /// and the guarded write; re-read so the error names the actual state.
    async fn transition_error(
        &self,
        e: RepositoryError,
        schedule_id: ScheduleId,
        to: &'static str,
    ) -> SchedulingError {
        if !e.is_constraint_violation() {
            return map_missing(e, "schedule", schedule_id.value());
        }
        match self.repo.get_schedule(schedule_id).await {
            Ok(current) => SchedulingError::InvalidStatusTransition {
                id: schedule_id,
                from: current.status.as_str(),
                to,
            },
            Err(e) => map_missing(e, "schedule", schedule_id.value()),
        }
    }

    async fn get(&self, schedule_id: ScheduleId) -> SchedulingResult<ClassSchedule> {
        self.repo
            .get_schedule(schedule_id)
            .await
            .map_err(|e| map_missing(e, "schedule", schedule_id.value()))
    }

    /// Lock, authoritative conflict scan, insert.
    ///
    /// If the storage backstop still rejects the insert, the scan is repeated
    /// once to name the business conflict; a clear re-scan means the
    /// conflicting row disappeared in between and the caller may retry.
    async fn insert_checked(
        &self,
        candidate: &BookingCandidate,
        exclusions: ConflictExclusions,
        recurring_id: Option<RecurringScheduleId>,
    ) -> SchedulingResult<ClassSchedule> {
        let guard = self
            .locks
            .acquire(candidate.teacher_id, candidate.date, self.lock_wait)
            .await?;

        check_conflict(self.repo.as_ref(), candidate, exclusions)
            .await?
            .into_result(candidate)?;

        let new = NewClassSchedule {
            teacher_id: candidate.teacher_id,
            student_id: candidate.student_id,
            school_id: candidate.school_id,
            scheduled_date: candidate.date,
            start_time: candidate.slot.start,
            end_time: candidate.slot.end,
            recurring_schedule_id: recurring_id,
        };

        let result = match self.repo.insert_schedule(new).await {
            Ok(schedule) => Ok(schedule),
            Err(e) if e.is_constraint_violation() => {
                log::warn!(
                    "slot guard rejected insert for teacher {} on {}",
                    candidate.teacher_id,
                    candidate.date
                );
                check_conflict(self.repo.as_ref(), candidate, exclusions)
                    .await?
                    .into_result(candidate)?;
                Err(SchedulingError::ConcurrencyConflict {
                    teacher_id: candidate.teacher_id.value(),
                    date: candidate.date,
                })
            }
            Err(e) => Err(e.into()),
        };
        drop(guard);
        result
    }
}

fn ensure_request_party(actor: &Actor, request: &BookingRequest) -> SchedulingResult<()> {
    let permitted = match actor.role {
        CallerRole::SchoolAdmin => true,
        CallerRole::Teacher => actor.id == request.teacher_id.value(),
        CallerRole::Student => actor.id == request.student_id.value(),
    };
    if permitted {
        Ok(())
    } else {
        Err(SchedulingError::PermissionDenied { action: "book" })
    }
}

fn ensure_booking_party(
    actor: &Actor,
    schedule: &ClassSchedule,
    action: &'static str,
) -> SchedulingResult<()> {
    let permitted = match actor.role {
        CallerRole::SchoolAdmin => true,
        CallerRole::Teacher => actor.id == schedule.teacher_id.value(),
        CallerRole::Student => actor.id == schedule.student_id.value(),
    };
    if permitted {
        Ok(())
    } else {
        Err(SchedulingError::PermissionDenied { action })
    }
}

/// Translate a repository miss into the domain's not-found error.
pub(crate) fn map_missing(e: RepositoryError, entity: &'static str, id: i64) -> SchedulingError {
    if e.is_not_found() {
        SchedulingError::not_found(entity, id)
    } else {
        e.into()
    }
}

//! Conflict detection for candidate bookings.
//!
//! A candidate passes when the teacher is available for the slot and neither
//! party has an overlapping pending or confirmed session. All interval checks
//! are half-open, so back-to-back sessions never conflict.

use chrono::NaiveDate;

use crate::api::{BookingRequest, RecurringScheduleId, ScheduleId, SchoolId, StudentId, TeacherId};
use crate::db::repository::FullRepository;
use crate::error::{SchedulingError, SchedulingResult};
use crate::models::TimeSlot;
use crate::services::availability::{availability_for, AvailabilityStatus};

/// A validated candidate slot for one teacher/student pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingCandidate {
    pub teacher_id: TeacherId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
}

impl BookingCandidate {
    /// Build a candidate, rejecting empty or inverted time ranges up front.
    pub fn new(
        teacher_id: TeacherId,
        student_id: StudentId,
        school_id: SchoolId,
        date: NaiveDate,
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    ) -> SchedulingResult<Self> {
        Ok(Self {
            teacher_id,
            student_id,
            school_id,
            date,
            slot: TimeSlot::new(start, end)?,
        })
    }

    pub fn from_request(request: &BookingRequest) -> SchedulingResult<Self> {
        Self::new(
            request.teacher_id,
            request.student_id,
            request.school_id,
            request.date,
            request.start_time,
            request.end_time,
        )
    }
}

/// Rows to ignore while scanning for overlaps.
///
/// `schedule_id` excludes the booking being rescheduled from colliding with
/// itself. `recurring_id` excludes sibling instances of the same group series
/// on the same date from counting as a teacher double-booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConflictExclusions {
    pub schedule_id: Option<ScheduleId>,
    pub recurring_id: Option<RecurringScheduleId>,
}

impl ConflictExclusions {
    pub fn reschedule(schedule_id: ScheduleId) -> Self {
        Self {
            schedule_id: Some(schedule_id),
            ..Default::default()
        }
    }

    pub fn series(recurring_id: RecurringScheduleId) -> Self {
        Self {
            recurring_id: Some(recurring_id),
            ..Default::default()
        }
    }
}

/// Outcome of a conflict scan. Exactly one variant applies; the first failing
/// check wins (availability before overlaps, teacher before student).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResult {
    Clear,
    OutsideAvailability,
    UnavailableException { reason: Option<String> },
    TeacherDoubleBooked { existing: ScheduleId },
    StudentDoubleBooked { existing: ScheduleId },
}

impl ConflictResult {
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }

    /// Convert a non-clear verdict into the matching typed error.
    pub fn into_result(self, candidate: &BookingCandidate) -> SchedulingResult<()> {
        let (date, slot) = (candidate.date, candidate.slot);
        match self {
            Self::Clear => Ok(()),
            Self::OutsideAvailability => Err(SchedulingError::OutsideAvailability {
                date,
                start: slot.start,
                end: slot.end,
            }),
            Self::UnavailableException { reason } => {
                Err(SchedulingError::UnavailableException { date, reason })
            }
            Self::TeacherDoubleBooked { existing } => Err(SchedulingError::TeacherDoubleBooked {
                date,
                start: slot.start,
                end: slot.end,
                existing,
            }),
            Self::StudentDoubleBooked { existing } => Err(SchedulingError::StudentDoubleBooked {
                date,
                start: slot.start,
                end: slot.end,
                existing,
            }),
        }
    }
}

/// Scan a candidate against availability and existing sessions.
///
/// Reads only; callable speculatively outside any lock. The booking
/// orchestrator repeats the scan inside its advisory lock before writing.
pub async fn check_conflict(
    repo: &dyn FullRepository,
    candidate: &BookingCandidate,
    exclusions: ConflictExclusions,
) -> SchedulingResult<ConflictResult> {
    match availability_for(
        repo,
        candidate.teacher_id,
        candidate.school_id,
        candidate.date,
        &candidate.slot,
    )
    .await?
    {
        AvailabilityStatus::Available => {}
        AvailabilityStatus::NoWindow => return Ok(ConflictResult::OutsideAvailability),
        AvailabilityStatus::BlockedByException { reason } => {
            return Ok(ConflictResult::UnavailableException { reason })
        }
    }

    let teacher_sessions = repo
        .active_for_teacher_on(candidate.teacher_id, candidate.date)
        .await?;
    for session in &teacher_sessions {
        if Some(session.id) == exclusions.schedule_id {
            continue;
        }
        // Sibling instances of the same group series share the teacher slot.
        if exclusions.recurring_id.is_some()
            && session.recurring_schedule_id == exclusions.recurring_id
        {
            continue;
        }
        if session.slot().overlaps(&candidate.slot) {
            return Ok(ConflictResult::TeacherDoubleBooked {
                existing: session.id,
            });
        }
    }

    let student_sessions = repo
        .active_for_student_on(candidate.student_id, candidate.date)
        .await?;
    for session in &student_sessions {
        if Some(session.id) == exclusions.schedule_id {
            continue;
        }
        if session.slot().overlaps(&candidate.slot) {
            return Ok(ConflictResult::StudentDoubleBooked {
                existing: session.id,
            });
        }
    }

    Ok(ConflictResult::Clear)
}

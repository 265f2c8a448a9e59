//! Availability resolution.
//!
//! Answers "can this teacher teach at this school during `[start, end)` on
//! this date?" from the recurring weekly windows and the per-date exceptions.
//! The answer fails closed: no window for the weekday means not available.

use chrono::{Datelike, NaiveDate};

use crate::api::{SchoolId, TeacherId};
use crate::db::repository::AvailabilityRepository;
use crate::error::SchedulingResult;
use crate::models::{union_contains, TimeSlot};

/// Discriminated availability verdict.
///
/// Callers that only need a yes/no use [`is_available`]; the conflict detector
/// uses the full verdict to report the precise rejection reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityStatus {
    /// The slot is fully inside the merged windows and no exception touches it.
    Available,
    /// No merged window for this weekday covers the slot.
    NoWindow,
    /// Windows cover the slot but an unavailability exception removes it.
    BlockedByException { reason: Option<String> },
}

impl AvailabilityStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Resolve the availability verdict for one candidate slot.
///
/// Pure read: no rows are written and no locks are taken, so this is safe to
/// call speculatively before entering the booking path.
pub async fn availability_for(
    repo: &dyn AvailabilityRepository,
    teacher_id: TeacherId,
    school_id: SchoolId,
    date: NaiveDate,
    slot: &TimeSlot,
) -> SchedulingResult<AvailabilityStatus> {
    let windows = repo
        .windows_for(teacher_id, school_id, date.weekday(), date)
        .await?;
    let refs: Vec<&_> = windows.iter().collect();

    if !union_contains(&refs, slot) {
        log::debug!(
            "teacher {} has no covering window on {} for {}-{}",
            teacher_id,
            date,
            slot.start,
            slot.end
        );
        return Ok(AvailabilityStatus::NoWindow);
    }

    let exceptions = repo.exceptions_on(teacher_id, school_id, date).await?;
    if let Some(blocking) = exceptions.iter().find(|e| e.blocks(slot)) {
        log::debug!(
            "teacher {} blocked by exception {} on {}",
            teacher_id,
            blocking.id,
            date
        );
        return Ok(AvailabilityStatus::BlockedByException {
            reason: blocking.reason.clone(),
        });
    }

    Ok(AvailabilityStatus::Available)
}

/// Boolean form of [`availability_for`].
pub async fn is_available(
    repo: &dyn AvailabilityRepository,
    teacher_id: TeacherId,
    school_id: SchoolId,
    date: NaiveDate,
    slot: &TimeSlot,
) -> SchedulingResult<bool> {
    Ok(availability_for(repo, teacher_id, school_id, date, slot)
        .await?
        .is_available())
}

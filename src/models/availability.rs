//! Teacher availability windows and unavailability exceptions.
//!
//! Availability is expressed as recurring weekly windows; exceptions remove
//! time from specific dates. All interval arithmetic uses half-open ranges
//! `[start, end)` so that back-to-back sessions never conflict.

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::api::{weekday_index, AvailabilityId, SchoolId, TeacherId, UnavailabilityId};
use crate::error::SchedulingError;

/// A half-open time-of-day interval `[start, end)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    /// Build a slot, rejecting empty or inverted ranges.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, SchedulingError> {
        if start >= end {
            return Err(SchedulingError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Half-open overlap test: `[s1,e1)` and `[s2,e2)` overlap iff
    /// `s1 < e2 && s2 < e1`. Adjacent slots (`e1 == s2`) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether this slot fully contains `other`.
    pub fn contains(&self, other: &TimeSlot) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether `other` can be merged into this slot (overlapping or adjacent).
    fn touches(&self, other: &TimeSlot) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A recurring weekly availability window for a teacher at one school.
///
/// Windows are soft-deactivated rather than deleted so that historical
/// bookings can still be validated against the windows that existed when they
/// were made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherAvailability {
    pub id: AvailabilityId,
    pub teacher_id: TeacherId,
    pub school_id: SchoolId,
    #[serde(with = "weekday_index")]
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
    pub effective_from: NaiveDate,
}

impl TeacherAvailability {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Whether this window applies when answering for `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.active && self.effective_from <= date
    }
}

/// Insert form of [`TeacherAvailability`] (id assigned by the repository).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeacherAvailability {
    pub teacher_id: TeacherId,
    pub school_id: SchoolId,
    #[serde(with = "weekday_index")]
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub effective_from: NaiveDate,
}

impl NewTeacherAvailability {
    /// Validate the window invariant (`start < end`).
    pub fn validate(&self) -> Result<(), SchedulingError> {
        TimeSlot::new(self.start_time, self.end_time).map(|_| ())
    }
}

/// A one-off exception removing time from a teacher's availability on a date.
///
/// Both times `None` means the whole day is blocked. Rows become immutable
/// once their date has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherUnavailability {
    pub id: UnavailabilityId,
    pub teacher_id: TeacherId,
    pub school_id: SchoolId,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl TeacherUnavailability {
    pub fn is_all_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// Whether this exception removes any part of `slot` on its date.
    ///
    /// A missing start or end is treated as open-ended on that side; an
    /// all-day exception blocks every slot.
    pub fn blocks(&self, slot: &TimeSlot) -> bool {
        match (self.start_time, self.end_time) {
            (None, None) => true,
            (Some(start), Some(end)) => start < slot.end && slot.start < end,
            (Some(start), None) => start < slot.end,
            (None, Some(end)) => slot.start < end,
        }
    }
}

/// Insert form of [`TeacherUnavailability`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeacherUnavailability {
    pub teacher_id: TeacherId,
    pub school_id: SchoolId,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl NewTeacherUnavailability {
    pub fn validate(&self) -> Result<(), SchedulingError> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => TimeSlot::new(start, end).map(|_| ()),
            _ => Ok(()),
        }
    }
}

/// Merge availability windows into a minimal set of disjoint slots.
///
/// Overlapping windows are redundant rather than forbidden, so the detector
/// works on their union. Adjacent windows (09-12 plus 12-15) merge into one
/// slot; a gap between windows stays a gap.
pub fn merge_windows(windows: &[&TeacherAvailability]) -> Vec<TimeSlot> {
    let mut slots: Vec<TimeSlot> = windows.iter().map(|w| w.slot()).collect();
    slots.sort_by_key(|s| (s.start, s.end));

    let mut merged: Vec<TimeSlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last) if last.touches(&slot) => {
                last.end = last.end.max(slot.end);
            }
            _ => merged.push(slot),
        }
    }
    merged
}

/// Whether the merged union of `windows` fully contains `candidate`.
///
/// Containment requires a single merged slot to cover the candidate: a range
/// spanning a gap is not covered even if both sides are.
pub fn union_contains(windows: &[&TeacherAvailability], candidate: &TimeSlot) -> bool {
    merge_windows(windows)
        .iter()
        .any(|slot| slot.contains(candidate))
}

//! Recurring series definitions and occurrence date arithmetic.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::api::{weekday_index, RecurringScheduleId, SchoolId, StudentId, TeacherId};
use crate::error::SchedulingError;
use crate::models::availability::TimeSlot;

/// How often a recurring series repeats.
///
/// Frequencies are expressed as a fixed day interval anchored at the series
/// start date, so a biweekly series keeps its phase across months.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Biweekly,
    EveryFourWeeks,
}

impl Frequency {
    pub fn interval_days(&self) -> u64 {
        match self {
            Self::Weekly => 7,
            Self::Biweekly => 14,
            Self::EveryFourWeeks => 28,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::EveryFourWeeks => "every_four_weeks",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            "every_four_weeks" => Ok(Self::EveryFourWeeks),
            other => Err(format!("unknown frequency: {}", other)),
        }
    }
}

/// Lifecycle status of a recurring series.
///
/// Pausing stops future generation without touching already-generated
/// instances; cancelling is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringStatus {
    Active,
    Paused,
    Cancelled,
}

impl RecurringStatus {
    /// Whether a series may move from this status to `next`.
    ///
    /// Active and Paused flip freely and either may be cancelled; Cancelled
    /// is terminal, a cancelled series can never resume generating.
    pub fn can_transition_to(&self, next: RecurringStatus) -> bool {
        use RecurringStatus::*;
        matches!(
            (self, next),
            (Active, Paused) | (Active, Cancelled) | (Paused, Active) | (Paused, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for RecurringStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown recurring status: {}", other)),
        }
    }
}

/// A recurring class series: one weekly slot, one teacher, one or more
/// students, repeated at a fixed frequency over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringClassSchedule {
    pub id: RecurringScheduleId,
    pub teacher_id: TeacherId,
    /// Students attending the series. Non-empty; usually a single student.
    pub student_ids: Vec<StudentId>,
    pub school_id: SchoolId,
    pub frequency: Frequency,
    #[serde(with = "weekday_index")]
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: RecurringStatus,
    /// Durable expansion cursor: every occurrence date up to and including
    /// this one has already been processed by the expander.
    pub last_generated_through: Option<NaiveDate>,
}

impl RecurringClassSchedule {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Structural validation of the series definition.
    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.start_time >= self.end_time {
            return Err(SchedulingError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if let Some(end_date) = self.end_date {
            if end_date < self.start_date {
                return Err(SchedulingError::invalid_recurrence(format!(
                    "end_date {} is before start_date {}",
                    end_date, self.start_date
                )));
            }
        }
        if self.student_ids.is_empty() {
            return Err(SchedulingError::invalid_recurrence(
                "series has no students",
            ));
        }
        Ok(())
    }

    /// The first occurrence on or after the series start date.
    ///
    /// The series anchor is the first date at or after `start_date` falling on
    /// `day_of_week`; every later occurrence is anchor + k * interval.
    pub fn anchor_date(&self) -> NaiveDate {
        let mut date = self.start_date;
        while date.weekday() != self.day_of_week {
            // Weekday is always reachable within 6 days; NaiveDate covers the range.
            date = date.succ_opt().expect("date overflow");
        }
        date
    }

    /// Occurrence dates within `[from, to]` (inclusive), in order.
    ///
    /// Dates before the series anchor are excluded; phase is preserved
    /// relative to the anchor regardless of `from`.
    pub fn occurrence_dates(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        let anchor = self.anchor_date();
        let interval = self.frequency.interval_days();
        let mut dates = Vec::new();

        let mut date = if from <= anchor {
            anchor
        } else {
            // First occurrence at or after `from`, keeping the anchor phase.
            let offset = (from - anchor).num_days() as u64;
            let steps = offset.div_ceil(interval);
            match anchor.checked_add_days(Days::new(steps * interval)) {
                Some(d) => d,
                None => return dates,
            }
        };

        while date <= to {
            dates.push(date);
            date = match date.checked_add_days(Days::new(interval)) {
                Some(d) => d,
                None => break,
            };
        }
        dates
    }
}

/// Insert form of [`RecurringClassSchedule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecurringClassSchedule {
    pub teacher_id: TeacherId,
    pub student_ids: Vec<StudentId>,
    pub school_id: SchoolId,
    pub frequency: Frequency,
    #[serde(with = "weekday_index")]
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl NewRecurringClassSchedule {
    pub fn validate(&self) -> Result<(), SchedulingError> {
        // Reuse the entity-level checks on a throwaway value.
        RecurringClassSchedule {
            id: RecurringScheduleId::new(0),
            teacher_id: self.teacher_id,
            student_ids: self.student_ids.clone(),
            school_id: self.school_id,
            frequency: self.frequency,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            start_date: self.start_date,
            end_date: self.end_date,
            status: RecurringStatus::Active,
            last_generated_through: None,
        }
        .validate()
    }
}

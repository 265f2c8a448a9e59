//! Booked class sessions and their status lifecycle.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{RecurringScheduleId, ScheduleId, SchoolId, StudentId, TeacherId};
use crate::error::SchedulingError;
use crate::models::availability::TimeSlot;

/// Lifecycle status of a booked session.
///
/// Transitions are monotonic: a cancelled session cannot be revived and a
/// completed session cannot change again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ScheduleStatus {
    /// Whether the session still occupies its slot for conflict purposes.
    pub fn blocks_slot(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn can_transition_to(&self, next: ScheduleStatus) -> bool {
        use ScheduleStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown schedule status: {}", other)),
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single booked class session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSchedule {
    pub id: ScheduleId,
    pub teacher_id: TeacherId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ScheduleStatus,
    /// Provenance: the recurring series this instance was generated from.
    pub recurring_schedule_id: Option<RecurringScheduleId>,
    pub booked_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl ClassSchedule {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Session length in whole minutes, derived from the time range.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Check the monotonic transition rule before a status change.
    pub fn ensure_transition(&self, next: ScheduleStatus) -> Result<(), SchedulingError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(SchedulingError::InvalidStatusTransition {
                id: self.id,
                from: self.status.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Insert form of [`ClassSchedule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClassSchedule {
    pub teacher_id: TeacherId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub recurring_schedule_id: Option<RecurringScheduleId>,
}

impl NewClassSchedule {
    pub fn validate(&self) -> Result<(), SchedulingError> {
        TimeSlot::new(self.start_time, self.end_time).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_monotonic() {
        use ScheduleStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        // No revival, no re-confirmation, no skipping pending->completed.
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn test_only_pending_and_confirmed_block_slots() {
        assert!(ScheduleStatus::Pending.blocks_slot());
        assert!(ScheduleStatus::Confirmed.blocks_slot());
        assert!(!ScheduleStatus::Completed.blocks_slot());
        assert!(!ScheduleStatus::Cancelled.blocks_slot());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ScheduleStatus::Pending,
            ScheduleStatus::Confirmed,
            ScheduleStatus::Completed,
            ScheduleStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ScheduleStatus>(), Ok(status));
        }
        assert!("unknown".parse::<ScheduleStatus>().is_err());
    }
}

//! Public API surface for the scheduling backend.
//!
//! This file consolidates the identifier newtypes, caller identity types and
//! the report/request types shared between the service layer and the HTTP API.
//! All types derive Serialize/Deserialize for JSON serialization.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::define_id_type;

define_id_type!(i64, TeacherId);
define_id_type!(i64, StudentId);
define_id_type!(i64, SchoolId);
define_id_type!(i64, ScheduleId);
define_id_type!(i64, RecurringScheduleId);
define_id_type!(i64, AvailabilityId);
define_id_type!(i64, UnavailabilityId);

/// Role of the caller invoking an orchestrator operation.
///
/// Permission decisions are made against this explicit role rather than
/// against the shape of an identity record, keeping the scheduler decoupled
/// from the surrounding user store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Teacher,
    Student,
    SchoolAdmin,
}

/// Caller identity supplied by the external identity collaborator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: CallerRole,
}

impl Actor {
    pub fn new(id: i64, role: CallerRole) -> Self {
        Self { id, role }
    }

    /// Convenience constructor for school-admin callers.
    pub fn admin(id: i64) -> Self {
        Self::new(id, CallerRole::SchoolAdmin)
    }
}

/// A request to book a single class session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub teacher_id: TeacherId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Why an occurrence was skipped during recurring-series expansion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OutsideAvailability,
    UnavailableException,
    TeacherDoubleBooked,
    StudentDoubleBooked,
    ConcurrencyConflict,
}

/// A single occurrence date that could not be materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOccurrence {
    pub date: NaiveDate,
    pub student_id: StudentId,
    pub reason: SkipReason,
}

/// Outcome of one expansion run over a recurring series.
///
/// Every occurrence in the expansion window is accounted for: it either shows
/// up as a created schedule id, appears in `skipped` with a typed reason, or
/// already existed from a previous run (idempotent no-op, not listed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionReport {
    pub recurring_schedule_id: Option<RecurringScheduleId>,
    pub created: Vec<ScheduleId>,
    pub skipped: Vec<SkippedOccurrence>,
}

impl ExpansionReport {
    pub fn new(recurring_schedule_id: RecurringScheduleId) -> Self {
        Self {
            recurring_schedule_id: Some(recurring_schedule_id),
            ..Default::default()
        }
    }
}

/// Serde adapter for day-of-week as an integer index, 0 = Monday .. 6 = Sunday.
///
/// The wire format follows the convention of the surrounding platform; chrono's
/// own Weekday serialization (string names) is deliberately not used.
pub mod weekday_index {
    use chrono::Weekday;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn to_index(day: Weekday) -> u8 {
        day.num_days_from_monday() as u8
    }

    pub fn from_index(index: u8) -> Option<Weekday> {
        match index {
            0 => Some(Weekday::Mon),
            1 => Some(Weekday::Tue),
            2 => Some(Weekday::Wed),
            3 => Some(Weekday::Thu),
            4 => Some(Weekday::Fri),
            5 => Some(Weekday::Sat),
            6 => Some(Weekday::Sun),
            _ => None,
        }
    }

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(to_index(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let index = u8::deserialize(deserializer)?;
        from_index(index)
            .ok_or_else(|| D::Error::custom(format!("day_of_week out of range: {}", index)))
    }
}

//! Request and response types for the REST API.
//!
//! Every mutating request carries the caller's [`Actor`]; identity is assumed
//! valid (authentication lives in front of this service).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{
    Actor, BookingRequest, RecurringScheduleId, ScheduleId, SchoolId, StudentId, TeacherId,
};
use crate::models::{
    ClassSchedule, NewRecurringClassSchedule, NewTeacherAvailability, NewTeacherUnavailability,
    ScheduleStatus,
};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// POST /v1/bookings request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub actor: Actor,
    pub teacher_id: TeacherId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl CreateBookingRequest {
    pub fn to_request(&self) -> BookingRequest {
        BookingRequest {
            teacher_id: self.teacher_id,
            student_id: self.student_id,
            school_id: self.school_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// POST /v1/bookings/{id}/reschedule request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub actor: Actor,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// POST /v1/bookings/{id}/cancel request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelRequest {
    pub actor: Actor,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for confirm/complete lifecycle endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct LifecycleRequest {
    pub actor: Actor,
}

/// A booked session as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingDto {
    pub id: ScheduleId,
    pub teacher_id: TeacherId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ScheduleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_schedule_id: Option<RecurringScheduleId>,
    pub booked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

impl From<ClassSchedule> for BookingDto {
    fn from(s: ClassSchedule) -> Self {
        Self {
            id: s.id,
            teacher_id: s.teacher_id,
            student_id: s.student_id,
            school_id: s.school_id,
            date: s.scheduled_date,
            start_time: s.start_time,
            end_time: s.end_time,
            status: s.status,
            recurring_schedule_id: s.recurring_schedule_id,
            booked_at: s.booked_at,
            cancelled_at: s.cancelled_at,
            completed_at: s.completed_at,
            cancellation_reason: s.cancellation_reason,
        }
    }
}

/// GET /v1/availability/check query parameters.
#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityCheckQuery {
    pub teacher_id: TeacherId,
    pub school_id: SchoolId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// GET /v1/availability/check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityCheckResponse {
    pub available: bool,
}

/// POST /v1/availability request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub actor: Actor,
    #[serde(flatten)]
    pub window: NewTeacherAvailability,
}

/// POST /v1/unavailability request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUnavailabilityRequest {
    pub actor: Actor,
    #[serde(flatten)]
    pub exception: NewTeacherUnavailability,
}

/// POST /v1/recurring request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRecurringRequest {
    pub actor: Actor,
    #[serde(flatten)]
    pub series: NewRecurringClassSchedule,
}

/// POST /v1/recurring/{id}/expand request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExpandRequest {
    /// Generate occurrences up to and including this date.
    pub horizon: NaiveDate,
}

//! Diesel row types and conversions to the domain entities.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;

use super::schema::{
    class_schedules, recurring_class_schedules, teacher_availability, teacher_unavailability,
};
use crate::api::{
    weekday_index, AvailabilityId, RecurringScheduleId, ScheduleId, SchoolId, StudentId,
    TeacherId, UnavailabilityId,
};
use crate::db::repository::RepositoryError;
use crate::models::{
    ClassSchedule, RecurringClassSchedule, TeacherAvailability, TeacherUnavailability,
};

fn weekday_from_db(index: i16) -> Result<chrono::Weekday, RepositoryError> {
    u8::try_from(index)
        .ok()
        .and_then(weekday_index::from_index)
        .ok_or_else(|| {
            RepositoryError::internal(format!("day_of_week column out of range: {}", index))
        })
}

#[derive(Debug, Queryable)]
pub struct AvailabilityRow {
    pub id: i64,
    pub teacher_id: i64,
    pub school_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
    pub effective_from: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AvailabilityRow> for TeacherAvailability {
    type Error = RepositoryError;

    fn try_from(row: AvailabilityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AvailabilityId::new(row.id),
            teacher_id: TeacherId::new(row.teacher_id),
            school_id: SchoolId::new(row.school_id),
            day_of_week: weekday_from_db(row.day_of_week)?,
            start_time: row.start_time,
            end_time: row.end_time,
            active: row.active,
            effective_from: row.effective_from,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = teacher_availability)]
pub struct NewAvailabilityRow {
    pub teacher_id: i64,
    pub school_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
    pub effective_from: NaiveDate,
}

#[derive(Debug, Queryable)]
pub struct UnavailabilityRow {
    pub id: i64,
    pub teacher_id: i64,
    pub school_id: i64,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UnavailabilityRow> for TeacherUnavailability {
    fn from(row: UnavailabilityRow) -> Self {
        Self {
            id: UnavailabilityId::new(row.id),
            teacher_id: TeacherId::new(row.teacher_id),
            school_id: SchoolId::new(row.school_id),
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            reason: row.reason,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = teacher_unavailability)]
pub struct NewUnavailabilityRow {
    pub teacher_id: i64,
    pub school_id: i64,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Queryable)]
pub struct ScheduleRow {
    pub id: i64,
    pub teacher_id: i64,
    pub student_id: i64,
    pub school_id: i64,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub recurring_schedule_id: Option<i64>,
    pub booked_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl TryFrom<ScheduleRow> for ClassSchedule {
    type Error = RepositoryError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(RepositoryError::internal)?;
        Ok(Self {
            id: ScheduleId::new(row.id),
            teacher_id: TeacherId::new(row.teacher_id),
            student_id: StudentId::new(row.student_id),
            school_id: SchoolId::new(row.school_id),
            scheduled_date: row.scheduled_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            recurring_schedule_id: row.recurring_schedule_id.map(RecurringScheduleId::new),
            booked_at: row.booked_at,
            cancelled_at: row.cancelled_at,
            completed_at: row.completed_at,
            cancellation_reason: row.cancellation_reason,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = class_schedules)]
pub struct NewScheduleRow {
    pub teacher_id: i64,
    pub student_id: i64,
    pub school_id: i64,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub recurring_schedule_id: Option<i64>,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Queryable)]
pub struct RecurringRow {
    pub id: i64,
    pub teacher_id: i64,
    pub student_ids: Vec<i64>,
    pub school_id: i64,
    pub frequency: String,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub last_generated_through: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RecurringRow> for RecurringClassSchedule {
    type Error = RepositoryError;

    fn try_from(row: RecurringRow) -> Result<Self, Self::Error> {
        let frequency = row.frequency.parse().map_err(RepositoryError::internal)?;
        let status = row.status.parse().map_err(RepositoryError::internal)?;
        Ok(Self {
            id: RecurringScheduleId::new(row.id),
            teacher_id: TeacherId::new(row.teacher_id),
            student_ids: row.student_ids.into_iter().map(StudentId::new).collect(),
            school_id: SchoolId::new(row.school_id),
            frequency,
            day_of_week: weekday_from_db(row.day_of_week)?,
            start_time: row.start_time,
            end_time: row.end_time,
            start_date: row.start_date,
            end_date: row.end_date,
            status,
            last_generated_through: row.last_generated_through,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recurring_class_schedules)]
pub struct NewRecurringRow {
    pub teacher_id: i64,
    pub student_ids: Vec<i64>,
    pub school_id: i64,
    pub frequency: String,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
}

//! In-memory repository implementation for unit testing and local development.
//!
//! State lives behind a single `parking_lot::RwLock`; operations are cheap and
//! never block across an await point.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use parking_lot::RwLock;

use crate::api::{
    AvailabilityId, RecurringScheduleId, ScheduleId, SchoolId, StudentId, TeacherId,
    UnavailabilityId,
};
use crate::db::repository::{
    AvailabilityRepository, ErrorContext, RecurringRepository, RepositoryError, RepositoryResult,
    ScheduleRepository,
};
use crate::models::{
    ClassSchedule, NewClassSchedule, NewRecurringClassSchedule, NewTeacherAvailability,
    NewTeacherUnavailability, RecurringClassSchedule, RecurringStatus, ScheduleStatus,
    TeacherAvailability, TeacherUnavailability,
};

#[derive(Default)]
struct Inner {
    availability: HashMap<AvailabilityId, TeacherAvailability>,
    unavailability: HashMap<UnavailabilityId, TeacherUnavailability>,
    schedules: HashMap<ScheduleId, ClassSchedule>,
    recurring: HashMap<RecurringScheduleId, RecurringClassSchedule>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of the repository traits.
#[derive(Default)]
pub struct LocalRepository {
    inner: RwLock<Inner>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored class schedules, for test assertions.
    pub fn schedule_count(&self) -> usize {
        self.inner.read().schedules.len()
    }
}

fn not_found(entity: &str, id: i64, operation: &str) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("{} {} not found", entity, id),
        ErrorContext::new(operation)
            .with_entity(entity)
            .with_entity_id(id),
    )
}

fn status_guard(entity: &str, id: i64, current: &str, operation: &str) -> RepositoryError {
    RepositoryError::ConstraintViolation {
        message: format!("{} {} is {}", entity, id, current),
        context: ErrorContext::new(operation)
            .with_entity(entity)
            .with_entity_id(id),
    }
}

#[async_trait]
impl AvailabilityRepository for LocalRepository {
    async fn insert_availability(
        &self,
        window: NewTeacherAvailability,
    ) -> RepositoryResult<TeacherAvailability> {
        if window.start_time >= window.end_time {
            return Err(RepositoryError::validation_with_context(
                "availability window start must be before end",
                ErrorContext::new("insert_availability").with_entity("availability"),
            ));
        }

        let mut inner = self.inner.write();
        let id = AvailabilityId::new(inner.next_id());
        let row = TeacherAvailability {
            id,
            teacher_id: window.teacher_id,
            school_id: window.school_id,
            day_of_week: window.day_of_week,
            start_time: window.start_time,
            end_time: window.end_time,
            active: true,
            effective_from: window.effective_from,
        };
        inner.availability.insert(id, row.clone());
        Ok(row)
    }

    async fn deactivate_availability(&self, id: AvailabilityId) -> RepositoryResult<()> {
        let mut inner = self.inner.write();
        let row = inner
            .availability
            .get_mut(&id)
            .ok_or_else(|| not_found("availability", id.value(), "deactivate_availability"))?;
        row.active = false;
        Ok(())
    }

    async fn windows_for(
        &self,
        teacher_id: TeacherId,
        school_id: SchoolId,
        day_of_week: Weekday,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TeacherAvailability>> {
        let inner = self.inner.read();
        Ok(inner
            .availability
            .values()
            .filter(|w| {
                w.teacher_id == teacher_id
                    && w.school_id == school_id
                    && w.day_of_week == day_of_week
                    && w.applies_on(date)
            })
            .cloned()
            .collect())
    }

    async fn insert_unavailability(
        &self,
        exception: NewTeacherUnavailability,
    ) -> RepositoryResult<TeacherUnavailability> {
        if let (Some(start), Some(end)) = (exception.start_time, exception.end_time) {
            if start >= end {
                return Err(RepositoryError::validation_with_context(
                    "unavailability start must be before end",
                    ErrorContext::new("insert_unavailability").with_entity("unavailability"),
                ));
            }
        }

        let mut inner = self.inner.write();
        let id = UnavailabilityId::new(inner.next_id());
        let row = TeacherUnavailability {
            id,
            teacher_id: exception.teacher_id,
            school_id: exception.school_id,
            date: exception.date,
            start_time: exception.start_time,
            end_time: exception.end_time,
            reason: exception.reason,
        };
        inner.unavailability.insert(id, row.clone());
        Ok(row)
    }

    async fn remove_unavailability(&self, id: UnavailabilityId) -> RepositoryResult<()> {
        let mut inner = self.inner.write();
        let row = inner
            .unavailability
            .get(&id)
            .ok_or_else(|| not_found("unavailability", id.value(), "remove_unavailability"))?;
        // Past exceptions are part of the historical record.
        if row.date < Utc::now().date_naive() {
            return Err(RepositoryError::validation_with_context(
                "unavailability rows are immutable once their date has passed",
                ErrorContext::new("remove_unavailability")
                    .with_entity("unavailability")
                    .with_entity_id(id),
            ));
        }
        inner.unavailability.remove(&id);
        Ok(())
    }

    async fn exceptions_on(
        &self,
        teacher_id: TeacherId,
        school_id: SchoolId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TeacherUnavailability>> {
        let inner = self.inner.read();
        Ok(inner
            .unavailability
            .values()
            .filter(|e| e.teacher_id == teacher_id && e.school_id == school_id && e.date == date)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScheduleRepository for LocalRepository {
    async fn insert_schedule(
        &self,
        schedule: NewClassSchedule,
    ) -> RepositoryResult<ClassSchedule> {
        let mut inner = self.inner.write();

        // Mirror of the Postgres slot-guard index: reject an exact duplicate
        // of a still-active slot for the same teacher and student.
        let duplicate = inner.schedules.values().any(|s| {
            s.status.blocks_slot()
                && s.teacher_id == schedule.teacher_id
                && s.student_id == schedule.student_id
                && s.scheduled_date == schedule.scheduled_date
                && s.start_time == schedule.start_time
        });
        if duplicate {
            return Err(RepositoryError::ConstraintViolation {
                message: "duplicate active booking for teacher/student/date/start".to_string(),
                context: ErrorContext::new("insert_schedule").with_entity("class_schedule"),
            });
        }

        let id = ScheduleId::new(inner.next_id());
        let row = ClassSchedule {
            id,
            teacher_id: schedule.teacher_id,
            student_id: schedule.student_id,
            school_id: schedule.school_id,
            scheduled_date: schedule.scheduled_date,
            start_time: schedule.start_time,
            end_time: schedule.end_time,
            status: ScheduleStatus::Pending,
            recurring_schedule_id: schedule.recurring_schedule_id,
            booked_at: Utc::now(),
            cancelled_at: None,
            completed_at: None,
            cancellation_reason: None,
        };
        inner.schedules.insert(id, row.clone());
        Ok(row)
    }

    async fn get_schedule(&self, id: ScheduleId) -> RepositoryResult<ClassSchedule> {
        let inner = self.inner.read();
        inner
            .schedules
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("class_schedule", id.value(), "get_schedule"))
    }

    async fn active_for_teacher_on(
        &self,
        teacher_id: TeacherId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ClassSchedule>> {
        let inner = self.inner.read();
        Ok(inner
            .schedules
            .values()
            .filter(|s| {
                s.teacher_id == teacher_id && s.scheduled_date == date && s.status.blocks_slot()
            })
            .cloned()
            .collect())
    }

    async fn active_for_student_on(
        &self,
        student_id: StudentId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ClassSchedule>> {
        let inner = self.inner.read();
        Ok(inner
            .schedules
            .values()
            .filter(|s| {
                s.student_id == student_id && s.scheduled_date == date && s.status.blocks_slot()
            })
            .cloned()
            .collect())
    }

    async fn update_schedule_slot(
        &self,
        id: ScheduleId,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepositoryResult<ClassSchedule> {
        let mut inner = self.inner.write();
        let row = inner
            .schedules
            .get_mut(&id)
            .ok_or_else(|| not_found("class_schedule", id.value(), "update_schedule_slot"))?;
        if !row.status.blocks_slot() {
            return Err(status_guard(
                "class_schedule",
                id.value(),
                row.status.as_str(),
                "update_schedule_slot",
            ));
        }
        row.scheduled_date = date;
        row.start_time = start_time;
        row.end_time = end_time;
        Ok(row.clone())
    }

    async fn set_schedule_status(
        &self,
        id: ScheduleId,
        expected: ScheduleStatus,
        status: ScheduleStatus,
        at: DateTime<Utc>,
    ) -> RepositoryResult<ClassSchedule> {
        let mut inner = self.inner.write();
        let row = inner
            .schedules
            .get_mut(&id)
            .ok_or_else(|| not_found("class_schedule", id.value(), "set_schedule_status"))?;
        // Compare-and-set under the write lock; a stale reader loses.
        if row.status != expected {
            return Err(status_guard(
                "class_schedule",
                id.value(),
                row.status.as_str(),
                "set_schedule_status",
            ));
        }
        row.status = status;
        match status {
            ScheduleStatus::Cancelled => row.cancelled_at = Some(at),
            ScheduleStatus::Completed => row.completed_at = Some(at),
            _ => {}
        }
        Ok(row.clone())
    }

    async fn cancel_schedule(
        &self,
        id: ScheduleId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> RepositoryResult<ClassSchedule> {
        let mut inner = self.inner.write();
        let row = inner
            .schedules
            .get_mut(&id)
            .ok_or_else(|| not_found("class_schedule", id.value(), "cancel_schedule"))?;
        if !row.status.blocks_slot() {
            return Err(status_guard(
                "class_schedule",
                id.value(),
                row.status.as_str(),
                "cancel_schedule",
            ));
        }
        row.status = ScheduleStatus::Cancelled;
        row.cancelled_at = Some(at);
        row.cancellation_reason = reason;
        Ok(row.clone())
    }

    async fn occurrence_exists(
        &self,
        recurring_id: RecurringScheduleId,
        date: NaiveDate,
        student_id: StudentId,
    ) -> RepositoryResult<bool> {
        let inner = self.inner.read();
        Ok(inner.schedules.values().any(|s| {
            s.recurring_schedule_id == Some(recurring_id)
                && s.scheduled_date == date
                && s.student_id == student_id
        }))
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl RecurringRepository for LocalRepository {
    async fn insert_recurring(
        &self,
        series: NewRecurringClassSchedule,
    ) -> RepositoryResult<RecurringClassSchedule> {
        let mut inner = self.inner.write();
        let id = RecurringScheduleId::new(inner.next_id());
        let row = RecurringClassSchedule {
            id,
            teacher_id: series.teacher_id,
            student_ids: series.student_ids,
            school_id: series.school_id,
            frequency: series.frequency,
            day_of_week: series.day_of_week,
            start_time: series.start_time,
            end_time: series.end_time,
            start_date: series.start_date,
            end_date: series.end_date,
            status: RecurringStatus::Active,
            last_generated_through: None,
        };
        inner.recurring.insert(id, row.clone());
        Ok(row)
    }

    async fn get_recurring(
        &self,
        id: RecurringScheduleId,
    ) -> RepositoryResult<RecurringClassSchedule> {
        let inner = self.inner.read();
        inner
            .recurring
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("recurring_schedule", id.value(), "get_recurring"))
    }

    async fn set_recurring_status(
        &self,
        id: RecurringScheduleId,
        status: RecurringStatus,
    ) -> RepositoryResult<RecurringClassSchedule> {
        let mut inner = self.inner.write();
        let row = inner
            .recurring
            .get_mut(&id)
            .ok_or_else(|| not_found("recurring_schedule", id.value(), "set_recurring_status"))?;
        if !row.status.can_transition_to(status) {
            return Err(status_guard(
                "recurring_schedule",
                id.value(),
                row.status.as_str(),
                "set_recurring_status",
            ));
        }
        row.status = status;
        Ok(row.clone())
    }

    async fn advance_generation_cursor(
        &self,
        id: RecurringScheduleId,
        through: NaiveDate,
    ) -> RepositoryResult<()> {
        let mut inner = self.inner.write();
        let row = inner.recurring.get_mut(&id).ok_or_else(|| {
            not_found("recurring_schedule", id.value(), "advance_generation_cursor")
        })?;
        if row.last_generated_through.map_or(true, |d| d < through) {
            row.last_generated_through = Some(through);
        }
        Ok(())
    }
}

//! Tests for recurring series expansion: the 2024 Tuesday scenario,
//! idempotence, skip reporting, pausing, and group series.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Weekday};

use classtime::db::repository::{
    AvailabilityRepository, FullRepository, RecurringRepository, ScheduleRepository,
};
use classtime::db::LocalRepository;
use classtime::models::{
    Frequency, NewClassSchedule, NewRecurringClassSchedule, NewTeacherAvailability,
    NewTeacherUnavailability, RecurringStatus, ScheduleStatus,
};
use classtime::services::{BookingOrchestrator, RecurrenceExpander};
use classtime::{RecurringScheduleId, SchoolId, SkipReason, StudentId, TeacherId};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Fixture {
    repo: Arc<dyn FullRepository>,
    expander: RecurrenceExpander,
}

/// Teacher 1 available Tuesdays 09:00-17:00 at school 1 from 2024-01-01.
async fn setup() -> Fixture {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    repo.insert_availability(NewTeacherAvailability {
        teacher_id: TeacherId::new(1),
        school_id: SchoolId::new(1),
        day_of_week: Weekday::Tue,
        start_time: t(9, 0),
        end_time: t(17, 0),
        effective_from: d(2024, 1, 1),
    })
    .await
    .unwrap();

    let orchestrator = Arc::new(BookingOrchestrator::new(repo.clone()));
    let expander = RecurrenceExpander::new(repo.clone(), orchestrator);
    Fixture { repo, expander }
}

/// Weekly Tuesdays 14:00-15:00, 2024-01-02 through 2024-03-26.
async fn tuesday_series(fixture: &Fixture, students: Vec<i64>) -> RecurringScheduleId {
    let series = fixture
        .repo
        .insert_recurring(NewRecurringClassSchedule {
            teacher_id: TeacherId::new(1),
            student_ids: students.into_iter().map(StudentId::new).collect(),
            school_id: SchoolId::new(1),
            frequency: Frequency::Weekly,
            day_of_week: Weekday::Tue,
            start_time: t(14, 0),
            end_time: t(15, 0),
            start_date: d(2024, 1, 2),
            end_date: Some(d(2024, 3, 26)),
        })
        .await
        .unwrap();
    series.id
}

// =========================================================
// The 2024 Tuesday scenario
// =========================================================

#[tokio::test]
async fn test_weekly_series_with_all_day_exception() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;

    // Teacher is away on Tuesday 2024-02-06.
    fixture
        .repo
        .insert_unavailability(NewTeacherUnavailability {
            teacher_id: TeacherId::new(1),
            school_id: SchoolId::new(1),
            date: d(2024, 2, 6),
            start_time: None,
            end_time: None,
            reason: Some("school holiday".to_string()),
        })
        .await
        .unwrap();

    let report = fixture
        .expander
        .expand(series_id, d(2024, 2, 27))
        .await
        .unwrap();

    // Tuesdays 01-02 through 02-27, minus the exception date.
    assert_eq!(report.created.len(), 8);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].date, d(2024, 2, 6));
    assert_eq!(report.skipped[0].reason, SkipReason::UnavailableException);

    // Created instances are pending and carry their provenance.
    let first = fixture.repo.get_schedule(report.created[0]).await.unwrap();
    assert_eq!(first.status, ScheduleStatus::Pending);
    assert_eq!(first.recurring_schedule_id, Some(series_id));
    assert_eq!(first.start_time, t(14, 0));
}

#[tokio::test]
async fn test_expansion_is_idempotent() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;

    let first = fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(first.created.len(), 5);

    // Same horizon again: nothing new, nothing skipped.
    let second = fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    assert!(second.created.is_empty());
    assert!(second.skipped.is_empty());
}

#[tokio::test]
async fn test_extending_the_horizon_resumes_from_cursor() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;

    fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    let extended = fixture
        .expander
        .expand(series_id, d(2024, 2, 29))
        .await
        .unwrap();

    // February Tuesdays only: 02-06, 02-13, 02-20, 02-27.
    assert_eq!(extended.created.len(), 4);
    let cursor = fixture
        .repo
        .get_recurring(series_id)
        .await
        .unwrap()
        .last_generated_through;
    assert_eq!(cursor, Some(d(2024, 2, 29)));
}

#[tokio::test]
async fn test_horizon_clamped_to_series_end() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;

    let report = fixture
        .expander
        .expand(series_id, d(2024, 12, 31))
        .await
        .unwrap();

    // 13 Tuesdays between 2024-01-02 and 2024-03-26 inclusive.
    assert_eq!(report.created.len(), 13);
}

// =========================================================
// Skips and aborts
// =========================================================

#[tokio::test]
async fn test_conflicting_occurrence_is_skipped_not_fatal() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;

    // A one-off session already occupies the slot on 2024-01-09.
    fixture
        .repo
        .insert_schedule(NewClassSchedule {
            teacher_id: TeacherId::new(1),
            student_id: StudentId::new(77),
            school_id: SchoolId::new(1),
            scheduled_date: d(2024, 1, 9),
            start_time: t(14, 0),
            end_time: t(15, 0),
            recurring_schedule_id: None,
        })
        .await
        .unwrap();

    let report = fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(report.created.len(), 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].date, d(2024, 1, 9));
    assert_eq!(report.skipped[0].reason, SkipReason::TeacherDoubleBooked);
}

#[tokio::test]
async fn test_unknown_series_aborts() {
    let fixture = setup().await;
    let err = fixture
        .expander
        .expand(RecurringScheduleId::new(404), d(2024, 1, 31))
        .await
        .unwrap_err();
    assert!(matches!(err, classtime::SchedulingError::NotFound { .. }));
}

// =========================================================
// Series lifecycle
// =========================================================

#[tokio::test]
async fn test_paused_series_generates_nothing() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;

    // Materialize January first, then pause.
    let before = fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(before.created.len(), 5);

    fixture
        .repo
        .set_recurring_status(series_id, RecurringStatus::Paused)
        .await
        .unwrap();

    let after = fixture
        .expander
        .expand(series_id, d(2024, 2, 29))
        .await
        .unwrap();
    assert!(after.created.is_empty());

    // Instances created before the pause survive.
    let kept = fixture.repo.get_schedule(before.created[0]).await.unwrap();
    assert_eq!(kept.status, ScheduleStatus::Pending);
}

#[tokio::test]
async fn test_cancelled_series_generates_nothing() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;
    fixture
        .repo
        .set_recurring_status(series_id, RecurringStatus::Cancelled)
        .await
        .unwrap();

    let report = fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    assert!(report.created.is_empty());
}

#[tokio::test]
async fn test_cancelled_series_cannot_be_revived() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;
    fixture
        .repo
        .set_recurring_status(series_id, RecurringStatus::Cancelled)
        .await
        .unwrap();

    // Cancellation is terminal: reactivating is rejected and the series
    // keeps generating nothing.
    let err = fixture
        .repo
        .set_recurring_status(series_id, RecurringStatus::Active)
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());

    let series = fixture.repo.get_recurring(series_id).await.unwrap();
    assert_eq!(series.status, RecurringStatus::Cancelled);

    let report = fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    assert!(report.created.is_empty());
}

#[tokio::test]
async fn test_paused_series_resumes_generating() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10]).await;
    fixture
        .repo
        .set_recurring_status(series_id, RecurringStatus::Paused)
        .await
        .unwrap();
    fixture
        .repo
        .set_recurring_status(series_id, RecurringStatus::Active)
        .await
        .unwrap();

    let report = fixture
        .expander
        .expand(series_id, d(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(report.created.len(), 5);
}

// =========================================================
// Group series and frequency
// =========================================================

#[tokio::test]
async fn test_group_series_books_every_student_without_self_conflict() {
    let fixture = setup().await;
    let series_id = tuesday_series(&fixture, vec![10, 11]).await;

    let report = fixture
        .expander
        .expand(series_id, d(2024, 1, 9))
        .await
        .unwrap();

    // Two dates, two students each, sharing the teacher's slot.
    assert_eq!(report.created.len(), 4);
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn test_biweekly_series_keeps_phase() {
    let fixture = setup().await;
    let series = fixture
        .repo
        .insert_recurring(NewRecurringClassSchedule {
            teacher_id: TeacherId::new(1),
            student_ids: vec![StudentId::new(10)],
            school_id: SchoolId::new(1),
            frequency: Frequency::Biweekly,
            day_of_week: Weekday::Tue,
            start_time: t(14, 0),
            end_time: t(15, 0),
            start_date: d(2024, 1, 2),
            end_date: None,
        })
        .await
        .unwrap();

    let report = fixture
        .expander
        .expand(series.id, d(2024, 2, 29))
        .await
        .unwrap();

    // 01-02, 01-16, 01-30, 02-13, 02-27.
    assert_eq!(report.created.len(), 5);
    let dates: Vec<_> = {
        let mut ds = Vec::new();
        for id in &report.created {
            ds.push(fixture.repo.get_schedule(*id).await.unwrap().scheduled_date);
        }
        ds
    };
    assert!(dates.contains(&d(2024, 1, 16)));
    assert!(dates.contains(&d(2024, 2, 13)));
    assert!(!dates.contains(&d(2024, 1, 9)));
}

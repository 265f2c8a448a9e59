//! Tests for the concurrency contract: exactly one winner for a contested
//! slot, bounded lock waits, guarded status writes, and the storage-layer
//! slot guard.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc, Weekday};

use classtime::db::repository::{AvailabilityRepository, FullRepository, ScheduleRepository};
use classtime::db::LocalRepository;
use classtime::models::{NewClassSchedule, NewTeacherAvailability, ScheduleStatus};
use classtime::services::{BookingOrchestrator, SlotLockRegistry};
use classtime::{
    Actor, BookingRequest, CallerRole, SchedulingError, SchoolId, StudentId, TeacherId,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// 2024-01-08 is a Monday.
fn monday() -> NaiveDate {
    d(2024, 1, 8)
}

async fn setup() -> Arc<BookingOrchestrator> {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    repo.insert_availability(NewTeacherAvailability {
        teacher_id: TeacherId::new(1),
        school_id: SchoolId::new(1),
        day_of_week: Weekday::Mon,
        start_time: t(9, 0),
        end_time: t(17, 0),
        effective_from: d(2024, 1, 1),
    })
    .await
    .unwrap();
    Arc::new(BookingOrchestrator::new(repo))
}

fn request(student_id: i64) -> BookingRequest {
    BookingRequest {
        teacher_id: TeacherId::new(1),
        student_id: StudentId::new(student_id),
        school_id: SchoolId::new(1),
        date: monday(),
        start_time: t(10, 0),
        end_time: t(11, 0),
    }
}

#[tokio::test]
async fn test_two_concurrent_bookings_exactly_one_wins() {
    let orchestrator = setup().await;

    let a = {
        let orch = orchestrator.clone();
        tokio::spawn(async move {
            orch.book(&Actor::new(10, CallerRole::Student), &request(10))
                .await
        })
    };
    let b = {
        let orch = orchestrator.clone();
        tokio::spawn(async move {
            orch.book(&Actor::new(11, CallerRole::Student), &request(11))
                .await
        })
    };

    let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
    let successes = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    // The loser sees the winner's booking, not a silent overwrite.
    let loser = if ra.is_ok() { rb } else { ra };
    assert!(matches!(
        loser.unwrap_err(),
        SchedulingError::TeacherDoubleBooked { .. }
    ));
}

#[tokio::test]
async fn test_many_concurrent_bookings_single_winner() {
    let orchestrator = setup().await;

    let mut handles = Vec::new();
    for student in 10..20 {
        let orch = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orch.book(&Actor::new(student, CallerRole::Student), &request(student))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_lock_acquisition_is_bounded() {
    let registry = SlotLockRegistry::new();
    let teacher = TeacherId::new(1);

    let held = registry
        .acquire(teacher, monday(), Duration::from_secs(1))
        .await
        .unwrap();

    let err = registry
        .acquire(teacher, monday(), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::ConcurrencyConflict { .. }));
    assert!(err.is_retryable());

    // A different day is an independent lock.
    registry
        .acquire(teacher, d(2024, 1, 15), Duration::from_millis(50))
        .await
        .unwrap();

    drop(held);
    registry
        .acquire(teacher, monday(), Duration::from_millis(50))
        .await
        .unwrap();
}

fn new_monday_schedule(student_id: i64) -> NewClassSchedule {
    NewClassSchedule {
        teacher_id: TeacherId::new(1),
        student_id: StudentId::new(student_id),
        school_id: SchoolId::new(1),
        scheduled_date: monday(),
        start_time: t(10, 0),
        end_time: t(11, 0),
        recurring_schedule_id: None,
    }
}

#[tokio::test]
async fn test_slot_guard_rejects_exact_duplicate() {
    let repo = LocalRepository::new();
    repo.insert_schedule(new_monday_schedule(10)).await.unwrap();
    let err = repo
        .insert_schedule(new_monday_schedule(10))
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[tokio::test]
async fn test_idle_locks_are_evicted_from_the_registry() {
    let registry = SlotLockRegistry::new();
    let teacher = TeacherId::new(1);

    for day in 1..=20 {
        let guard = registry
            .acquire(teacher, d(2024, 1, day), Duration::from_millis(50))
            .await
            .unwrap();
        drop(guard);
    }

    // The next acquire sweeps every released teacher-day.
    let _held = registry
        .acquire(teacher, d(2024, 2, 1), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(registry.tracked_slots(), 1);
}

#[tokio::test]
async fn test_stale_status_write_cannot_revive_a_cancelled_session() {
    let repo = LocalRepository::new();
    let schedule = repo.insert_schedule(new_monday_schedule(10)).await.unwrap();
    repo.cancel_schedule(schedule.id, None, Utc::now())
        .await
        .unwrap();

    // A writer that still believes the session is pending loses the race.
    let err = repo
        .set_schedule_status(
            schedule.id,
            ScheduleStatus::Pending,
            ScheduleStatus::Confirmed,
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());

    let current = repo.get_schedule(schedule.id).await.unwrap();
    assert_eq!(current.status, ScheduleStatus::Cancelled);
}

#[tokio::test]
async fn test_terminal_session_cannot_be_cancelled_or_moved_again() {
    let repo = LocalRepository::new();
    let schedule = repo.insert_schedule(new_monday_schedule(10)).await.unwrap();
    repo.cancel_schedule(schedule.id, None, Utc::now())
        .await
        .unwrap();

    let err = repo
        .cancel_schedule(schedule.id, None, Utc::now())
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());

    let err = repo
        .update_schedule_slot(schedule.id, d(2024, 1, 15), t(12, 0), t(13, 0))
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

//! Tests for the conflict detector: availability gating, teacher/student
//! overlap scans, and exclusion handling.
//!
//! Scenario baseline: teacher 1 is available Mondays 09:00-17:00 at school 1.

use chrono::{NaiveDate, NaiveTime, Weekday};

use classtime::db::repositories::LocalRepository;
use classtime::db::repository::{AvailabilityRepository, ScheduleRepository};
use classtime::models::{NewClassSchedule, NewTeacherAvailability, NewTeacherUnavailability};
use classtime::services::{check_conflict, BookingCandidate, ConflictExclusions, ConflictResult};
use classtime::{SchoolId, StudentId, TeacherId};

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

async fn setup_monday_teacher(repo: &LocalRepository, teacher_id: i64) {
    repo.insert_availability(NewTeacherAvailability {
        teacher_id: TeacherId::new(teacher_id),
        school_id: SchoolId::new(1),
        day_of_week: Weekday::Mon,
        start_time: t(9, 0),
        end_time: t(17, 0),
        effective_from: d(2024, 1, 1),
    })
    .await
    .unwrap();
}

async fn book_directly(
    repo: &LocalRepository,
    teacher_id: i64,
    student_id: i64,
    start: NaiveTime,
    end: NaiveTime,
) -> classtime::ClassSchedule {
    repo.insert_schedule(NewClassSchedule {
        teacher_id: TeacherId::new(teacher_id),
        student_id: StudentId::new(student_id),
        school_id: SchoolId::new(1),
        scheduled_date: monday(),
        start_time: start,
        end_time: end,
        recurring_schedule_id: None,
    })
    .await
    .unwrap()
}

fn candidate(teacher_id: i64, student_id: i64, start: NaiveTime, end: NaiveTime) -> BookingCandidate {
    BookingCandidate::new(
        TeacherId::new(teacher_id),
        StudentId::new(student_id),
        SchoolId::new(1),
        monday(),
        start,
        end,
    )
    .unwrap()
}

// =========================================================
// Availability gating
// =========================================================

#[tokio::test]
async fn test_clear_candidate_inside_availability() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;

    let verdict = check_conflict(
        &repo,
        &candidate(1, 10, t(10, 0), t(11, 0)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(verdict, ConflictResult::Clear);
}

#[tokio::test]
async fn test_candidate_outside_availability() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;

    let verdict = check_conflict(
        &repo,
        &candidate(1, 10, t(8, 0), t(9, 30)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(verdict, ConflictResult::OutsideAvailability);
}

#[tokio::test]
async fn test_exception_reported_distinctly_from_no_window() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;
    repo.insert_unavailability(NewTeacherUnavailability {
        teacher_id: TeacherId::new(1),
        school_id: SchoolId::new(1),
        date: monday(),
        start_time: None,
        end_time: None,
        reason: Some("conference".to_string()),
    })
    .await
    .unwrap();

    let verdict = check_conflict(
        &repo,
        &candidate(1, 10, t(10, 0), t(11, 0)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        verdict,
        ConflictResult::UnavailableException {
            reason: Some("conference".to_string())
        }
    );
}

// =========================================================
// Overlap scans
// =========================================================

#[tokio::test]
async fn test_teacher_double_booking_detected() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;
    let existing = book_directly(&repo, 1, 10, t(10, 0), t(11, 0)).await;

    let verdict = check_conflict(
        &repo,
        &candidate(1, 11, t(10, 30), t(11, 30)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        verdict,
        ConflictResult::TeacherDoubleBooked {
            existing: existing.id
        }
    );
}

#[tokio::test]
async fn test_back_to_back_sessions_do_not_conflict() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;
    book_directly(&repo, 1, 10, t(10, 0), t(11, 0)).await;

    // Ends exactly when the next one starts, and vice versa.
    let after = check_conflict(
        &repo,
        &candidate(1, 11, t(11, 0), t(12, 0)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    let before = check_conflict(
        &repo,
        &candidate(1, 11, t(9, 0), t(10, 0)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(after, ConflictResult::Clear);
    assert_eq!(before, ConflictResult::Clear);
}

#[tokio::test]
async fn test_student_double_booking_across_teachers() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;
    setup_monday_teacher(&repo, 2).await;
    let existing = book_directly(&repo, 1, 10, t(10, 0), t(11, 0)).await;

    // Same student with a different teacher at an overlapping time.
    let verdict = check_conflict(
        &repo,
        &candidate(2, 10, t(10, 30), t(11, 30)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        verdict,
        ConflictResult::StudentDoubleBooked {
            existing: existing.id
        }
    );
}

#[tokio::test]
async fn test_cancelled_session_does_not_block() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;
    let existing = book_directly(&repo, 1, 10, t(10, 0), t(11, 0)).await;
    repo.cancel_schedule(existing.id, None, chrono::Utc::now())
        .await
        .unwrap();

    let verdict = check_conflict(
        &repo,
        &candidate(1, 11, t(10, 0), t(11, 0)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(verdict, ConflictResult::Clear);
}

#[tokio::test]
async fn test_excluded_schedule_does_not_collide_with_itself() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;
    let existing = book_directly(&repo, 1, 10, t(10, 0), t(11, 0)).await;

    // A reschedule shifted by 30 minutes overlaps only the original row.
    let verdict = check_conflict(
        &repo,
        &candidate(1, 10, t(10, 30), t(11, 30)),
        ConflictExclusions::reschedule(existing.id),
    )
    .await
    .unwrap();
    assert_eq!(verdict, ConflictResult::Clear);
}

#[tokio::test]
async fn test_availability_checked_before_overlaps() {
    let repo = LocalRepository::new();
    setup_monday_teacher(&repo, 1).await;
    book_directly(&repo, 1, 10, t(16, 30), t(17, 0)).await;

    // Outside the window AND overlapping: availability wins.
    let verdict = check_conflict(
        &repo,
        &candidate(1, 11, t(16, 30), t(17, 30)),
        ConflictExclusions::default(),
    )
    .await
    .unwrap();
    assert_eq!(verdict, ConflictResult::OutsideAvailability);
}

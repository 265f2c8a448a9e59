//! Recurring series expansion.
//!
//! Materializes concrete `ClassSchedule` instances from a recurring series up
//! to a horizon date. Each occurrence is booked through the orchestrator as
//! its own atomic check-and-create; a conflicting occurrence lands in the
//! report's `skipped` list and never aborts the run.

use std::sync::Arc;

use chrono::{Days, NaiveDate};

use crate::api::{ExpansionReport, RecurringScheduleId, SkippedOccurrence};
use crate::db::repository::FullRepository;
use crate::error::SchedulingResult;
use crate::models::RecurringStatus;
use crate::services::booking::{map_missing, BookingOrchestrator};
use crate::services::conflict::BookingCandidate;

/// Expands recurring series into bookable instances.
pub struct RecurrenceExpander {
    repo: Arc<dyn FullRepository>,
    orchestrator: Arc<BookingOrchestrator>,
}

impl RecurrenceExpander {
    pub fn new(repo: Arc<dyn FullRepository>, orchestrator: Arc<BookingOrchestrator>) -> Self {
        Self { repo, orchestrator }
    }

    /// Expand one series up to and including `horizon`.
    ///
    /// Idempotent: dates already materialized for a student (in any status)
    /// are passed over without touching them, so running twice with the same
    /// horizon creates nothing new. The durable cursor advances as dates are
    /// processed, so a crash mid-run resumes where it stopped.
    ///
    /// Paused and cancelled series produce an empty report; already-created
    /// future instances are left alone.
    pub async fn expand(
        &self,
        recurring_id: RecurringScheduleId,
        horizon: NaiveDate,
    ) -> SchedulingResult<ExpansionReport> {
        let series = self
            .repo
            .get_recurring(recurring_id)
            .await
            .map_err(|e| map_missing(e, "recurring_schedule", recurring_id.value()))?;
        series.validate()?;

        let mut report = ExpansionReport::new(recurring_id);
        if series.status != RecurringStatus::Active {
            log::info!(
                "series {} is {}, nothing to expand",
                recurring_id,
                series.status.as_str()
            );
            return Ok(report);
        }

        let from = match series.last_generated_through {
            Some(cursor) => match cursor.checked_add_days(Days::new(1)) {
                Some(next) => next.max(series.start_date),
                None => return Ok(report),
            },
            None => series.start_date,
        };
        let to = match series.end_date {
            Some(end) => end.min(horizon),
            None => horizon,
        };
        if to < from {
            return Ok(report);
        }

        for date in series.occurrence_dates(from, to) {
            for &student_id in &series.student_ids {
                if self
                    .repo
                    .occurrence_exists(recurring_id, date, student_id)
                    .await?
                {
                    continue;
                }

                let candidate = BookingCandidate::new(
                    series.teacher_id,
                    student_id,
                    series.school_id,
                    date,
                    series.start_time,
                    series.end_time,
                )?;

                match self
                    .orchestrator
                    .book_for_series(&candidate, recurring_id)
                    .await
                {
                    Ok(schedule) => report.created.push(schedule.id),
                    Err(e) => match e.as_skip_reason() {
                        Some(reason) => {
                            log::debug!(
                                "skipping occurrence {} of series {} for student {}: {}",
                                date,
                                recurring_id,
                                student_id,
                                e
                            );
                            report.skipped.push(SkippedOccurrence {
                                date,
                                student_id,
                                reason,
                            });
                        }
                        // Structural failures abort the whole run.
                        None => return Err(e),
                    },
                }
            }
            self.repo
                .advance_generation_cursor(recurring_id, date)
                .await?;
        }

        // Dates between the last occurrence and the window end are settled too.
        self.repo.advance_generation_cursor(recurring_id, to).await?;

        log::info!(
            "expanded series {} through {}: {} created, {} skipped",
            recurring_id,
            to,
            report.created.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

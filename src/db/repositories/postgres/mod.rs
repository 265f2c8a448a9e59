//! Postgres repository implementation using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//! - Partial unique index (`class_schedules_slot_guard`) as the storage-layer
//!   backstop against concurrent double-booking
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tokio::task;

use crate::api::{
    weekday_index, AvailabilityId, RecurringScheduleId, ScheduleId, SchoolId, StudentId,
    TeacherId, UnavailabilityId,
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

mod models;
mod schema;

use models::*;
use schema::{class_schedules, recurring_class_schedules, teacher_availability, teacher_unavailability};

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", 10),
            min_pool_size: env_or("PG_POOL_MIN", 1),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", 30),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", 600),
            max_retries: env_or("PG_MAX_RETRIES", 3),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", 100),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
                RepositoryError::internal(format!("Migration failed: {}", e))
                    .with_operation("run_migrations")
            })?;
        }

        Ok(Self { pool, config })
    }

    /// Run a blocking Diesel closure on the pool, retrying transient failures
    /// with exponential backoff.
    async fn with_conn<R, F>(&self, operation: &'static str, f: F) -> RepositoryResult<R>
    where
        R: Send + 'static,
        F: Fn(&mut PgConnection) -> RepositoryResult<R> + Send + 'static,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;

        task::spawn_blocking(move || {
            let mut attempt = 0;
            loop {
                let result = pool
                    .get()
                    .map_err(RepositoryError::from)
                    .and_then(|mut conn| f(&mut conn));

                match result {
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        let delay = retry_delay_ms << attempt;
                        log::warn!(
                            "retrying {} after transient error (attempt {}): {}",
                            operation,
                            attempt + 1,
                            e
                        );
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                    }
                    other => return other,
                }
            }
        })
        .await
        .map_err(|e| RepositoryError::internal(format!("blocking task join error: {}", e)))?
        .map_err(|e| e.with_operation(operation))
    }
}

const SLOT_BLOCKING_STATUSES: [&str; 2] = ["pending", "confirmed"];

/// A guarded UPDATE matched no row: either the status guard rejected the
/// write or the session does not exist. Re-read to tell the two apart.
fn schedule_guard_error(
    conn: &mut PgConnection,
    raw_id: i64,
    operation: &'static str,
) -> RepositoryError {
    match class_schedules::table
        .find(raw_id)
        .first::<ScheduleRow>(conn)
        .optional()
    {
        Ok(Some(row)) => RepositoryError::ConstraintViolation {
            message: format!("class_schedule {} is {}", raw_id, row.status),
            context: ErrorContext::new(operation)
                .with_entity("class_schedule")
                .with_entity_id(raw_id),
        },
        Ok(None) => RepositoryError::not_found_with_context(
            format!("class_schedule {} not found", raw_id),
            ErrorContext::new(operation)
                .with_entity("class_schedule")
                .with_entity_id(raw_id),
        ),
        Err(e) => e.into(),
    }
}

#[async_trait]
impl AvailabilityRepository for PostgresRepository {
    async fn insert_availability(
        &self,
        window: NewTeacherAvailability,
    ) -> RepositoryResult<TeacherAvailability> {
        let row = NewAvailabilityRow {
            teacher_id: window.teacher_id.value(),
            school_id: window.school_id.value(),
            day_of_week: weekday_index::to_index(window.day_of_week) as i16,
            start_time: window.start_time,
            end_time: window.end_time,
            active: true,
            effective_from: window.effective_from,
        };
        self.with_conn("insert_availability", move |conn| {
            let inserted: AvailabilityRow = diesel::insert_into(teacher_availability::table)
                .values(&row)
                .get_result(conn)?;
            inserted.try_into()
        })
        .await
    }

    async fn deactivate_availability(&self, id: AvailabilityId) -> RepositoryResult<()> {
        let raw_id = id.value();
        self.with_conn("deactivate_availability", move |conn| {
            let updated = diesel::update(teacher_availability::table.find(raw_id))
                .set(teacher_availability::active.eq(false))
                .execute(conn)?;
            if updated == 0 {
                return Err(RepositoryError::not_found_with_context(
                    format!("availability {} not found", raw_id),
                    ErrorContext::default()
                        .with_entity("availability")
                        .with_entity_id(raw_id),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn windows_for(
        &self,
        teacher_id: TeacherId,
        school_id: SchoolId,
        day_of_week: Weekday,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TeacherAvailability>> {
        let (t, s) = (teacher_id.value(), school_id.value());
        let day = weekday_index::to_index(day_of_week) as i16;
        self.with_conn("windows_for", move |conn| {
            let rows: Vec<AvailabilityRow> = teacher_availability::table
                .filter(teacher_availability::teacher_id.eq(t))
                .filter(teacher_availability::school_id.eq(s))
                .filter(teacher_availability::day_of_week.eq(day))
                .filter(teacher_availability::active.eq(true))
                .filter(teacher_availability::effective_from.le(date))
                .load(conn)?;
            rows.into_iter().map(TryInto::try_into).collect()
        })
        .await
    }

    async fn insert_unavailability(
        &self,
        exception: NewTeacherUnavailability,
    ) -> RepositoryResult<TeacherUnavailability> {
        let row = NewUnavailabilityRow {
            teacher_id: exception.teacher_id.value(),
            school_id: exception.school_id.value(),
            date: exception.date,
            start_time: exception.start_time,
            end_time: exception.end_time,
            reason: exception.reason,
        };
        self.with_conn("insert_unavailability", move |conn| {
            let inserted: UnavailabilityRow = diesel::insert_into(teacher_unavailability::table)
                .values(&row)
                .get_result(conn)?;
            Ok(inserted.into())
        })
        .await
    }

    async fn remove_unavailability(&self, id: UnavailabilityId) -> RepositoryResult<()> {
        let raw_id = id.value();
        self.with_conn("remove_unavailability", move |conn| {
            let row: UnavailabilityRow = teacher_unavailability::table
                .find(raw_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| {
                    RepositoryError::not_found(format!("unavailability {} not found", raw_id))
                })?;
            if row.date < Utc::now().date_naive() {
                return Err(RepositoryError::validation_with_context(
                    "unavailability rows are immutable once their date has passed",
                    ErrorContext::default()
                        .with_entity("unavailability")
                        .with_entity_id(raw_id),
                ));
            }
            diesel::delete(teacher_unavailability::table.find(raw_id)).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn exceptions_on(
        &self,
        teacher_id: TeacherId,
        school_id: SchoolId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TeacherUnavailability>> {
        let (t, s) = (teacher_id.value(), school_id.value());
        self.with_conn("exceptions_on", move |conn| {
            let rows: Vec<UnavailabilityRow> = teacher_unavailability::table
                .filter(teacher_unavailability::teacher_id.eq(t))
                .filter(teacher_unavailability::school_id.eq(s))
                .filter(teacher_unavailability::date.eq(date))
                .load(conn)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }
}

#[async_trait]
impl ScheduleRepository for PostgresRepository {
    async fn insert_schedule(
        &self,
        schedule: NewClassSchedule,
    ) -> RepositoryResult<ClassSchedule> {
        let row = NewScheduleRow {
            teacher_id: schedule.teacher_id.value(),
            student_id: schedule.student_id.value(),
            school_id: schedule.school_id.value(),
            scheduled_date: schedule.scheduled_date,
            start_time: schedule.start_time,
            end_time: schedule.end_time,
            status: ScheduleStatus::Pending.as_str().to_string(),
            recurring_schedule_id: schedule.recurring_schedule_id.map(|id| id.value()),
            booked_at: Utc::now(),
        };
        self.with_conn("insert_schedule", move |conn| {
            let inserted: ScheduleRow = diesel::insert_into(class_schedules::table)
                .values(&row)
                .get_result(conn)?;
            inserted.try_into()
        })
        .await
    }

    async fn get_schedule(&self, id: ScheduleId) -> RepositoryResult<ClassSchedule> {
        let raw_id = id.value();
        self.with_conn("get_schedule", move |conn| {
            let row: ScheduleRow = class_schedules::table
                .find(raw_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        format!("class_schedule {} not found", raw_id),
                        ErrorContext::default()
                            .with_entity("class_schedule")
                            .with_entity_id(raw_id),
                    )
                })?;
            row.try_into()
        })
        .await
    }

    async fn active_for_teacher_on(
        &self,
        teacher_id: TeacherId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ClassSchedule>> {
        let t = teacher_id.value();
        self.with_conn("active_for_teacher_on", move |conn| {
            let rows: Vec<ScheduleRow> = class_schedules::table
                .filter(class_schedules::teacher_id.eq(t))
                .filter(class_schedules::scheduled_date.eq(date))
                .filter(class_schedules::status.eq_any(SLOT_BLOCKING_STATUSES))
                .load(conn)?;
            rows.into_iter().map(TryInto::try_into).collect()
        })
        .await
    }

    async fn active_for_student_on(
        &self,
        student_id: StudentId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ClassSchedule>> {
        let s = student_id.value();
        self.with_conn("active_for_student_on", move |conn| {
            let rows: Vec<ScheduleRow> = class_schedules::table
                .filter(class_schedules::student_id.eq(s))
                .filter(class_schedules::scheduled_date.eq(date))
                .filter(class_schedules::status.eq_any(SLOT_BLOCKING_STATUSES))
                .load(conn)?;
            rows.into_iter().map(TryInto::try_into).collect()
        })
        .await
    }

    async fn update_schedule_slot(
        &self,
        id: ScheduleId,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepositoryResult<ClassSchedule> {
        let raw_id = id.value();
        self.with_conn("update_schedule_slot", move |conn| {
            let row: Option<ScheduleRow> = diesel::update(
                class_schedules::table
                    .find(raw_id)
                    .filter(class_schedules::status.eq_any(SLOT_BLOCKING_STATUSES)),
            )
            .set((
                class_schedules::scheduled_date.eq(date),
                class_schedules::start_time.eq(start_time),
                class_schedules::end_time.eq(end_time),
            ))
            .get_result(conn)
            .optional()?;
            match row {
                Some(row) => row.try_into(),
                None => Err(schedule_guard_error(conn, raw_id, "update_schedule_slot")),
            }
        })
        .await
    }

    async fn set_schedule_status(
        &self,
        id: ScheduleId,
        expected: ScheduleStatus,
        status: ScheduleStatus,
        at: DateTime<Utc>,
    ) -> RepositoryResult<ClassSchedule> {
        let raw_id = id.value();
        self.with_conn("set_schedule_status", move |conn| {
            // Compare-and-set: the WHERE clause pins the expected status so a
            // concurrent transition makes this update match nothing.
            let target = class_schedules::table
                .find(raw_id)
                .filter(class_schedules::status.eq(expected.as_str()));
            let row: Option<ScheduleRow> = match status {
                ScheduleStatus::Cancelled => diesel::update(target)
                    .set((
                        class_schedules::status.eq(status.as_str()),
                        class_schedules::cancelled_at.eq(Some(at)),
                    ))
                    .get_result(conn)
                    .optional()?,
                ScheduleStatus::Completed => diesel::update(target)
                    .set((
                        class_schedules::status.eq(status.as_str()),
                        class_schedules::completed_at.eq(Some(at)),
                    ))
                    .get_result(conn)
                    .optional()?,
                _ => diesel::update(target)
                    .set(class_schedules::status.eq(status.as_str()))
                    .get_result(conn)
                    .optional()?,
            };
            match row {
                Some(row) => row.try_into(),
                None => Err(schedule_guard_error(conn, raw_id, "set_schedule_status")),
            }
        })
        .await
    }

    async fn cancel_schedule(
        &self,
        id: ScheduleId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> RepositoryResult<ClassSchedule> {
        let raw_id = id.value();
        self.with_conn("cancel_schedule", move |conn| {
            let row: Option<ScheduleRow> = diesel::update(
                class_schedules::table
                    .find(raw_id)
                    .filter(class_schedules::status.eq_any(SLOT_BLOCKING_STATUSES)),
            )
            .set((
                class_schedules::status.eq(ScheduleStatus::Cancelled.as_str()),
                class_schedules::cancelled_at.eq(Some(at)),
                class_schedules::cancellation_reason.eq(reason.clone()),
            ))
            .get_result(conn)
            .optional()?;
            match row {
                Some(row) => row.try_into(),
                None => Err(schedule_guard_error(conn, raw_id, "cancel_schedule")),
            }
        })
        .await
    }

    async fn occurrence_exists(
        &self,
        recurring_id: RecurringScheduleId,
        date: NaiveDate,
        student_id: StudentId,
    ) -> RepositoryResult<bool> {
        let (r, s) = (recurring_id.value(), student_id.value());
        self.with_conn("occurrence_exists", move |conn| {
            let found: bool = diesel::select(diesel::dsl::exists(
                class_schedules::table
                    .filter(class_schedules::recurring_schedule_id.eq(Some(r)))
                    .filter(class_schedules::scheduled_date.eq(date))
                    .filter(class_schedules::student_id.eq(s)),
            ))
            .get_result(conn)?;
            Ok(found)
        })
        .await
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn("health_check", move |conn| {
            sql_query("SELECT 1").execute(conn)?;
            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl RecurringRepository for PostgresRepository {
    async fn insert_recurring(
        &self,
        series: NewRecurringClassSchedule,
    ) -> RepositoryResult<RecurringClassSchedule> {
        let row = NewRecurringRow {
            teacher_id: series.teacher_id.value(),
            student_ids: series.student_ids.iter().map(|id| id.value()).collect(),
            school_id: series.school_id.value(),
            frequency: series.frequency.as_str().to_string(),
            day_of_week: weekday_index::to_index(series.day_of_week) as i16,
            start_time: series.start_time,
            end_time: series.end_time,
            start_date: series.start_date,
            end_date: series.end_date,
            status: RecurringStatus::Active.as_str().to_string(),
        };
        self.with_conn("insert_recurring", move |conn| {
            let inserted: RecurringRow = diesel::insert_into(recurring_class_schedules::table)
                .values(&row)
                .get_result(conn)?;
            inserted.try_into()
        })
        .await
    }

    async fn get_recurring(
        &self,
        id: RecurringScheduleId,
    ) -> RepositoryResult<RecurringClassSchedule> {
        let raw_id = id.value();
        self.with_conn("get_recurring", move |conn| {
            let row: RecurringRow = recurring_class_schedules::table
                .find(raw_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        format!("recurring_schedule {} not found", raw_id),
                        ErrorContext::default()
                            .with_entity("recurring_schedule")
                            .with_entity_id(raw_id),
                    )
                })?;
            row.try_into()
        })
        .await
    }

    async fn set_recurring_status(
        &self,
        id: RecurringScheduleId,
        status: RecurringStatus,
    ) -> RepositoryResult<RecurringClassSchedule> {
        let raw_id = id.value();
        self.with_conn("set_recurring_status", move |conn| {
            // Statuses a series may hold for this transition to be legal;
            // cancelled never appears, so a cancelled series stays cancelled.
            let sources: Vec<&str> = match status {
                RecurringStatus::Active => vec!["paused"],
                RecurringStatus::Paused => vec!["active"],
                RecurringStatus::Cancelled => vec!["active", "paused"],
            };
            let row: Option<RecurringRow> = diesel::update(
                recurring_class_schedules::table
                    .find(raw_id)
                    .filter(recurring_class_schedules::status.eq_any(sources)),
            )
            .set(recurring_class_schedules::status.eq(status.as_str()))
            .get_result(conn)
            .optional()?;
            match row {
                Some(row) => row.try_into(),
                None => {
                    match recurring_class_schedules::table
                        .find(raw_id)
                        .first::<RecurringRow>(conn)
                        .optional()
                    {
                        Ok(Some(current)) => Err(RepositoryError::ConstraintViolation {
                            message: format!(
                                "recurring_schedule {} is {}, cannot become {}",
                                raw_id,
                                current.status,
                                status.as_str()
                            ),
                            context: ErrorContext::new("set_recurring_status")
                                .with_entity("recurring_schedule")
                                .with_entity_id(raw_id),
                        }),
                        Ok(None) => Err(RepositoryError::not_found_with_context(
                            format!("recurring_schedule {} not found", raw_id),
                            ErrorContext::new("set_recurring_status")
                                .with_entity("recurring_schedule")
                                .with_entity_id(raw_id),
                        )),
                        Err(e) => Err(e.into()),
                    }
                }
            }
        })
        .await
    }

    async fn advance_generation_cursor(
        &self,
        id: RecurringScheduleId,
        through: NaiveDate,
    ) -> RepositoryResult<()> {
        let raw_id = id.value();
        self.with_conn("advance_generation_cursor", move |conn| {
            // The cursor only moves forward.
            diesel::update(
                recurring_class_schedules::table
                    .find(raw_id)
                    .filter(
                        recurring_class_schedules::last_generated_through
                            .is_null()
                            .or(recurring_class_schedules::last_generated_through.lt(through)),
                    ),
            )
            .set(recurring_class_schedules::last_generated_through.eq(Some(through)))
            .execute(conn)?;
            Ok(())
        })
        .await
    }
}

//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the service
//! layer for business logic.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::dto::{
    AvailabilityCheckQuery, AvailabilityCheckResponse, BookingDto, CancelRequest,
    CreateAvailabilityRequest, CreateBookingRequest, CreateRecurringRequest,
    CreateUnavailabilityRequest, ExpandRequest, HealthResponse, LifecycleRequest,
    RescheduleRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{Actor, CallerRole, ExpansionReport, RecurringScheduleId, ScheduleId, TeacherId};
use crate::models::{RecurringClassSchedule, TeacherAvailability, TeacherUnavailability, TimeSlot};
use crate::services;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Availability setup is restricted to the teacher themselves or an admin.
fn ensure_setup_permitted(actor: &Actor, teacher_id: TeacherId) -> Result<(), AppError> {
    let permitted = match actor.role {
        CallerRole::SchoolAdmin => true,
        CallerRole::Teacher => actor.id == teacher_id.value(),
        CallerRole::Student => false,
    };
    if permitted {
        Ok(())
    } else {
        Err(AppError::Scheduling(
            crate::error::SchedulingError::PermissionDenied {
                action: "manage availability",
            },
        ))
    }
}

/// GET /health
///
/// Verify the service is running and storage is reachable.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

/// POST /v1/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDto>), AppError> {
    let schedule = state
        .orchestrator
        .book(&request.actor, &request.to_request())
        .await?;
    Ok((StatusCode::CREATED, Json(schedule.into())))
}

/// POST /v1/bookings/{id}/reschedule
pub async fn reschedule_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RescheduleRequest>,
) -> HandlerResult<BookingDto> {
    let schedule = state
        .orchestrator
        .reschedule(
            &request.actor,
            ScheduleId::new(id),
            request.date,
            request.start_time,
            request.end_time,
        )
        .await?;
    Ok(Json(schedule.into()))
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CancelRequest>,
) -> HandlerResult<BookingDto> {
    let schedule = state
        .orchestrator
        .cancel(&request.actor, ScheduleId::new(id), request.reason)
        .await?;
    Ok(Json(schedule.into()))
}

/// POST /v1/bookings/{id}/confirm
pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<LifecycleRequest>,
) -> HandlerResult<BookingDto> {
    let schedule = state
        .orchestrator
        .confirm(&request.actor, ScheduleId::new(id))
        .await?;
    Ok(Json(schedule.into()))
}

/// POST /v1/bookings/{id}/complete
pub async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<LifecycleRequest>,
) -> HandlerResult<BookingDto> {
    let schedule = state
        .orchestrator
        .complete(&request.actor, ScheduleId::new(id))
        .await?;
    Ok(Json(schedule.into()))
}

/// GET /v1/availability/check
pub async fn check_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityCheckQuery>,
) -> HandlerResult<AvailabilityCheckResponse> {
    let slot = TimeSlot::new(query.start_time, query.end_time)?;
    let available = services::is_available(
        state.repository.as_ref(),
        query.teacher_id,
        query.school_id,
        query.date,
        &slot,
    )
    .await?;
    Ok(Json(AvailabilityCheckResponse { available }))
}

/// POST /v1/availability
pub async fn create_availability(
    State(state): State<AppState>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<TeacherAvailability>), AppError> {
    ensure_setup_permitted(&request.actor, request.window.teacher_id)?;
    request.window.validate()?;
    let window = state.repository.insert_availability(request.window).await?;
    Ok((StatusCode::CREATED, Json(window)))
}

/// POST /v1/unavailability
pub async fn create_unavailability(
    State(state): State<AppState>,
    Json(request): Json<CreateUnavailabilityRequest>,
) -> Result<(StatusCode, Json<TeacherUnavailability>), AppError> {
    ensure_setup_permitted(&request.actor, request.exception.teacher_id)?;
    request.exception.validate()?;
    let exception = state
        .repository
        .insert_unavailability(request.exception)
        .await?;
    Ok((StatusCode::CREATED, Json(exception)))
}

/// POST /v1/recurring
pub async fn create_recurring(
    State(state): State<AppState>,
    Json(request): Json<CreateRecurringRequest>,
) -> Result<(StatusCode, Json<RecurringClassSchedule>), AppError> {
    ensure_setup_permitted(&request.actor, request.series.teacher_id)?;
    request.series.validate()?;
    let series = state.repository.insert_recurring(request.series).await?;
    Ok((StatusCode::CREATED, Json(series)))
}

/// POST /v1/recurring/{id}/expand
pub async fn expand_recurring(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ExpandRequest>,
) -> HandlerResult<ExpansionReport> {
    let report = state
        .expander
        .expand(RecurringScheduleId::new(id), request.horizon)
        .await?;
    Ok(Json(report))
}

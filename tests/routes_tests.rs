//! End-to-end tests for the REST API, driving the router directly with
//! `tower::ServiceExt::oneshot`.

#![cfg(feature = "http-server")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use classtime::db::LocalRepository;
use classtime::http::{create_router, AppState};

fn app() -> Router {
    let repo = Arc::new(LocalRepository::new());
    create_router(AppState::new(repo))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn admin() -> Value {
    json!({ "id": 99, "role": "school_admin" })
}

/// Teacher 1, Mondays 09:00-17:00 at school 1. 2024-01-08 is a Monday.
async fn seed_monday_window(router: &Router) {
    let response = router
        .clone()
        .oneshot(post(
            "/v1/availability",
            json!({
                "actor": admin(),
                "teacher_id": 1,
                "school_id": 1,
                "day_of_week": 0,
                "start_time": "09:00:00",
                "end_time": "17:00:00",
                "effective_from": "2024-01-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

fn booking_body(student_id: i64, start: &str, end: &str) -> Value {
    json!({
        "actor": { "id": student_id, "role": "student" },
        "teacher_id": 1,
        "student_id": student_id,
        "school_id": 1,
        "date": "2024-01-08",
        "start_time": start,
        "end_time": end
    })
}

// =========================================================
// Health
// =========================================================

#[tokio::test]
async fn test_health_endpoint() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}

// =========================================================
// Bookings
// =========================================================

#[tokio::test]
async fn test_create_booking_returns_created() {
    let router = app();
    seed_monday_window(&router).await;

    let response = router
        .oneshot(post(
            "/v1/bookings",
            booking_body(10, "10:00:00", "11:00:00"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["teacher_id"], 1);
    assert_eq!(body["date"], "2024-01-08");
}

#[tokio::test]
async fn test_conflicting_booking_is_409_with_code() {
    let router = app();
    seed_monday_window(&router).await;

    let first = router
        .clone()
        .oneshot(post(
            "/v1/bookings",
            booking_body(10, "10:00:00", "11:00:00"),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = router
        .oneshot(post(
            "/v1/bookings",
            booking_body(11, "10:30:00", "11:30:00"),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let body = body_json(second).await;
    assert_eq!(body["code"], "TEACHER_DOUBLE_BOOKED");
}

#[tokio::test]
async fn test_booking_by_stranger_is_forbidden() {
    let router = app();
    seed_monday_window(&router).await;

    let mut body = booking_body(10, "10:00:00", "11:00:00");
    body["actor"] = json!({ "id": 999, "role": "student" });

    let response = router.oneshot(post("/v1/bookings", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_booking_outside_availability_is_409() {
    let router = app();
    seed_monday_window(&router).await;

    let response = router
        .oneshot(post(
            "/v1/bookings",
            booking_body(10, "07:00:00", "08:00:00"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = body_json(response).await;
    assert_eq!(body["code"], "OUTSIDE_AVAILABILITY");
}

#[tokio::test]
async fn test_cancel_unknown_booking_is_404() {
    let router = app();
    let response = router
        .oneshot(post(
            "/v1/bookings/404/cancel",
            json!({ "actor": admin(), "reason": "no-show" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_flow_over_http() {
    let router = app();
    seed_monday_window(&router).await;

    let created = router
        .clone()
        .oneshot(post(
            "/v1/bookings",
            booking_body(10, "10:00:00", "11:00:00"),
        ))
        .await
        .unwrap();
    let id = body_json(created).await["id"].as_i64().unwrap();

    let cancelled = router
        .oneshot(post(
            &format!("/v1/bookings/{}/cancel", id),
            json!({ "actor": { "id": 10, "role": "student" }, "reason": "illness" }),
        ))
        .await
        .unwrap();
    assert_eq!(cancelled.status(), StatusCode::OK);

    let body = body_json(cancelled).await;
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellation_reason"], "illness");
}

// =========================================================
// Availability check
// =========================================================

#[tokio::test]
async fn test_availability_check_query() {
    let router = app();
    seed_monday_window(&router).await;

    let available = router
        .clone()
        .oneshot(get(
            "/v1/availability/check?teacher_id=1&school_id=1&date=2024-01-08&start_time=10:00:00&end_time=11:00:00",
        ))
        .await
        .unwrap();
    assert_eq!(available.status(), StatusCode::OK);
    assert_eq!(body_json(available).await["available"], true);

    // Tuesday has no window.
    let unavailable = router
        .oneshot(get(
            "/v1/availability/check?teacher_id=1&school_id=1&date=2024-01-09&start_time=10:00:00&end_time=11:00:00",
        ))
        .await
        .unwrap();
    assert_eq!(body_json(unavailable).await["available"], false);
}

// =========================================================
// Recurring series
// =========================================================

#[tokio::test]
async fn test_recurring_create_and_expand() {
    let router = app();

    // Tuesday window for the series below.
    let window = router
        .clone()
        .oneshot(post(
            "/v1/availability",
            json!({
                "actor": admin(),
                "teacher_id": 1,
                "school_id": 1,
                "day_of_week": 1,
                "start_time": "09:00:00",
                "end_time": "17:00:00",
                "effective_from": "2024-01-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(window.status(), StatusCode::CREATED);

    let created = router
        .clone()
        .oneshot(post(
            "/v1/recurring",
            json!({
                "actor": admin(),
                "teacher_id": 1,
                "student_ids": [10],
                "school_id": 1,
                "frequency": "weekly",
                "day_of_week": 1,
                "start_time": "14:00:00",
                "end_time": "15:00:00",
                "start_date": "2024-01-02",
                "end_date": "2024-03-26"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let series_id = body_json(created).await["id"].as_i64().unwrap();

    let expanded = router
        .oneshot(post(
            &format!("/v1/recurring/{}/expand", series_id),
            json!({ "horizon": "2024-01-31" }),
        ))
        .await
        .unwrap();
    assert_eq!(expanded.status(), StatusCode::OK);

    let report = body_json(expanded).await;
    assert_eq!(report["created"].as_array().unwrap().len(), 5);
    assert_eq!(report["skipped"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_student_cannot_create_availability() {
    let router = app();
    let response = router
        .oneshot(post(
            "/v1/availability",
            json!({
                "actor": { "id": 10, "role": "student" },
                "teacher_id": 1,
                "school_id": 1,
                "day_of_week": 0,
                "start_time": "09:00:00",
                "end_time": "17:00:00",
                "effective_from": "2024-01-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_recurring_definition_is_400() {
    let router = app();
    let response = router
        .oneshot(post(
            "/v1/recurring",
            json!({
                "actor": admin(),
                "teacher_id": 1,
                "student_ids": [],
                "school_id": 1,
                "frequency": "weekly",
                "day_of_week": 1,
                "start_time": "14:00:00",
                "end_time": "15:00:00",
                "start_date": "2024-01-02"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

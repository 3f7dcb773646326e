use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

mod common;

use common::{doctor_token, patient_token, send_json};

#[tokio::test]
async fn create_session_starts_pending() {
    let app = common::create_test_app().await;
    let token = doctor_token(&app.config, &format!("doctor-{}", Uuid::new_v4()));

    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/sessions/",
        &token,
        Some(json!({
            "patient_id": "patient-1",
            "mode": "art_exploration",
            "interruption_time": 5,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["mode"], "art_exploration");
    assert_eq!(body["interruption_time"], 5);
    assert!(body["session_id"].as_str().is_some());
    assert!(body.get("started_at").is_none());
}

#[tokio::test]
async fn interruption_time_bounds_are_enforced() {
    let app = common::create_test_app().await;
    let token = doctor_token(&app.config, &format!("doctor-{}", Uuid::new_v4()));

    for (secs, expected) in [
        (0, StatusCode::BAD_REQUEST),
        (301, StatusCode::BAD_REQUEST),
        (1, StatusCode::CREATED),
        (300, StatusCode::CREATED),
    ] {
        let (status, body) = send_json(
            &app.router,
            "POST",
            "/api/sessions/",
            &token,
            Some(json!({
                "patient_id": "patient-1",
                "mode": "memory_reconstruction",
                "interruption_time": secs,
            })),
        )
        .await;
        assert_eq!(status, expected, "interruption_time={secs} body: {body}");
        if expected == StatusCode::BAD_REQUEST {
            assert_eq!(body["error"], "validation_failure");
        }
    }
}

#[tokio::test]
async fn only_doctors_schedule_sessions() {
    let app = common::create_test_app().await;
    let token = patient_token(&app.config, "patient-1");

    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/sessions/",
        &token,
        Some(json!({
            "patient_id": "patient-1",
            "mode": "art_exploration",
            "interruption_time": 5,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = common::create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/sessions/{}/status", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_transitions_are_monotonic() {
    let app = common::create_test_app().await;
    let doctor = format!("doctor-{}", Uuid::new_v4());
    let token = doctor_token(&app.config, &doctor);
    let session_id = create_session(&app, &token, "patient-1", "art_exploration").await;

    // Skipping a phase is rejected
    for target in ["in_evaluation", "completed"] {
        let (status, body) = send_json(
            &app.router,
            "PATCH",
            &format!("/api/sessions/{session_id}"),
            &token,
            Some(json!({ "status": target })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "target={target}");
        assert_eq!(body["error"], "invalid_transition");
    }

    // The immediate successor is accepted and stamps started_at once
    let (status, body) = send_json(
        &app.router,
        "PATCH",
        &format!("/api/sessions/{session_id}"),
        &token,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");
    let started_at = body["started_at"].as_str().unwrap().to_string();

    // A retried start is a no-op, not an error, and keeps the stamp
    let (status, body) = send_json(
        &app.router,
        "PATCH",
        &format!("/api/sessions/{session_id}"),
        &token,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["started_at"].as_str().unwrap(), started_at);

    // Going backwards is rejected
    let (status, _) = send_json(
        &app.router,
        "PATCH",
        &format!("/api/sessions/{session_id}"),
        &token,
        Some(json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_endpoint_reports_unknown_sessions() {
    let app = common::create_test_app().await;
    let token = doctor_token(&app.config, "doctor-1");

    let (status, body) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{}/status", Uuid::new_v4()),
        &token,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn only_participants_read_a_session() {
    let app = common::create_test_app().await;
    let owner = format!("doctor-{}", Uuid::new_v4());
    let token = doctor_token(&app.config, &owner);
    let session_id = create_session(&app, &token, "patient-1", "art_exploration").await;

    // The scheduled patient may read it
    let patient = patient_token(&app.config, "patient-1");
    let (status, _) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{session_id}/status"),
        &patient,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // An unrelated clinician may not
    let stranger = doctor_token(&app.config, "doctor-someone-else");
    let (status, _) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{session_id}/status"),
        &stranger,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_rules_follow_ownership_and_phase() {
    let app = common::create_test_app().await;
    let owner = format!("doctor-{}", Uuid::new_v4());
    let token = doctor_token(&app.config, &owner);
    let session_id = create_session(&app, &token, "patient-1", "art_exploration").await;

    // A different clinician cannot delete
    let stranger = doctor_token(&app.config, "doctor-someone-else");
    let (status, _) = send_json(
        &app.router,
        "DELETE",
        &format!("/api/sessions/{session_id}"),
        &stranger,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Not while the patient is mid-activity
    let (status, _) = send_json(
        &app.router,
        "PATCH",
        &format!("/api/sessions/{session_id}"),
        &token,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app.router,
        "DELETE",
        &format!("/api/sessions/{session_id}"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A pending session deletes cleanly
    let other_session = create_session(&app, &token, "patient-1", "art_exploration").await;
    let (status, _) = send_json(
        &app.router,
        "DELETE",
        &format!("/api/sessions/{other_session}"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{other_session}/status"),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_returns_json_error() {
    let app = common::create_test_app().await;
    let token = doctor_token(&app.config, "doctor-1");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sessions/")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "validation_failure");
}

async fn create_session(
    app: &common::TestApp,
    token: &str,
    patient_id: &str,
    mode: &str,
) -> String {
    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/sessions/",
        token,
        Some(json!({
            "patient_id": patient_id,
            "mode": mode,
            "interruption_time": 5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    body["session_id"].as_str().unwrap().to_string()
}

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

mod common;

use common::{doctor_token, patient_token, send_json, TestApp};

const STORY: &str = "We woke up early. We had breakfast. We walked to the park. We had a nap.";

const EVENTS: [&str; 4] = [
    "We woke up early",
    "We had breakfast",
    "We walked to the park",
    "We had a nap",
];

#[tokio::test]
async fn results_are_unavailable_until_completion() {
    let app = common::create_test_app().await;
    let patient_id = format!("patient-{}", Uuid::new_v4());
    let doctor = doctor_token(&app.config, &format!("doctor-{}", Uuid::new_v4()));
    let patient = patient_token(&app.config, &patient_id);

    let session_id = create_art_session(&app, &doctor, &patient_id).await;

    // Pending
    let (status, body) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{session_id}/results"),
        &doctor,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["error"], "not_completed");

    // Still mid-evaluation
    start_session(&app, &patient, &session_id).await;
    save_art(&app, &patient, &session_id).await;
    create_evaluation(&app, &patient, &session_id).await;

    let (status, _) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{session_id}/results"),
        &doctor,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn overall_accuracy_is_the_category_mean_not_the_pooled_ratio() {
    let app = common::create_test_app().await;
    let patient_id = format!("patient-{}", Uuid::new_v4());
    let doctor = doctor_token(&app.config, &format!("doctor-{}", Uuid::new_v4()));
    let patient = patient_token(&app.config, &patient_id);

    let session_id = create_art_session(&app, &doctor, &patient_id).await;
    start_session(&app, &patient, &session_id).await;
    save_art(&app, &patient, &session_id).await;
    let eval_id = create_evaluation(&app, &patient, &session_id).await;

    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/evaluation/art-exploration/story-open-question",
        &patient,
        Some(json!({
            "eval_id": eval_id,
            "text": "A full day outdoors.",
            "elapsed_seconds": 20,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Middle events swapped: positions 1 and 4 match -> 2/4
    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/evaluation/art-exploration/chronological-order-question",
        &patient,
        Some(json!({
            "eval_id": eval_id,
            "selected_option_0": EVENTS[0],
            "selected_option_1": EVENTS[2],
            "selected_option_2": EVENTS[1],
            "selected_option_3": EVENTS[3],
            "elapsed_seconds": 40,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // One objective right, two wrong -> 1/3
    submit_objective(&app, &patient, &eval_id, "environment", "park", "park").await;
    submit_objective(&app, &patient, &eval_id, "period", "evening", "morning").await;
    submit_objective(&app, &patient, &eval_id, "emotion", "sad", "happy").await;

    let (status, _) = send_json(
        &app.router,
        "POST",
        &format!("/api/sessions/{session_id}/complete"),
        &patient,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, results) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{session_id}/results"),
        &doctor,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {results}");
    assert_eq!(results["mode"], "art_exploration");

    // Mean of (2/4, 1/3): 41.67 -- a pooled 3/7 would be 42.86
    let expected = (50.0 + 100.0 / 3.0) / 2.0;
    let overall = results["overall_accuracy"].as_f64().unwrap();
    assert!((overall - expected).abs() < 1e-6, "overall={overall}");
}

#[tokio::test]
async fn results_are_for_session_participants_only() {
    let app = common::create_test_app().await;
    let patient_id = format!("patient-{}", Uuid::new_v4());
    let doctor = doctor_token(&app.config, &format!("doctor-{}", Uuid::new_v4()));

    let session_id = create_art_session(&app, &doctor, &patient_id).await;

    let stranger = doctor_token(&app.config, "doctor-unrelated");
    let (status, _) = send_json(
        &app.router,
        "GET",
        &format!("/api/sessions/{session_id}/results"),
        &stranger,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn img(id: &str) -> serde_json::Value {
    json!({ "id": id, "url": format!("https://images.example/{id}.jpg") })
}

async fn create_art_session(app: &TestApp, token: &str, patient_id: &str) -> String {
    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/sessions/",
        token,
        Some(json!({
            "patient_id": patient_id,
            "mode": "art_exploration",
            "interruption_time": 5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    body["session_id"].as_str().unwrap().to_string()
}

async fn start_session(app: &TestApp, token: &str, session_id: &str) {
    let (status, body) = send_json(
        &app.router,
        "PATCH",
        &format!("/api/sessions/{session_id}"),
        token,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
}

async fn save_art(app: &TestApp, token: &str, session_id: &str) {
    let (status, body) = send_json(
        &app.router,
        "POST",
        &format!("/api/art/save?session_id={session_id}"),
        token,
        Some(json!({
            "dataset": "default",
            "language": "en",
            "story": STORY,
            "images_selected": [img("art-1"), img("art-2"), img("art-3")],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
}

async fn create_evaluation(app: &TestApp, token: &str, session_id: &str) -> String {
    let (status, body) = send_json(
        &app.router,
        "POST",
        &format!("/api/evaluation/create?session_id={session_id}"),
        token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    body["id"].as_str().unwrap().to_string()
}

async fn submit_objective(
    app: &TestApp,
    token: &str,
    eval_id: &str,
    question_type: &str,
    selected: &str,
    correct: &str,
) {
    let mut options = vec![selected.to_string()];
    if selected != correct {
        options.push(correct.to_string());
    }
    options.push("neither".to_string());

    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/evaluation/objective-question",
        token,
        Some(json!({
            "eval_id": eval_id,
            "question_type": question_type,
            "options": options,
            "selected_option": selected,
            "correct_option": correct,
            "elapsed_seconds": 9,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
}

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use reminisce_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService, ROLE_DOCTOR, ROLE_PATIENT},
    services::AppState,
};

pub struct TestApp {
    pub router: Router,
    pub config: Config,
}

pub async fn create_test_app() -> TestApp {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Rate limiting would throttle the request storms these tests produce
    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    eprintln!("Test config loaded - Redis URI: {}", config.redis_uri);

    // Connect to test databases
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    eprintln!("MongoDB connected");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    eprintln!("Redis client created, attempting connection...");

    // Create app state (connection is established inside)
    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client, redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    eprintln!("AppState initialized successfully");

    TestApp {
        router: create_router(app_state),
        config,
    }
}

/// Token issuance is out of scope for the service, so tests mint their own.
pub fn token_for(config: &Config, user_id: &str, role: &str) -> String {
    let service = JwtService::new(&config.jwt_secret);
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iat: chrono::Utc::now().timestamp() as usize,
    };
    service
        .generate_token(claims)
        .expect("Failed to mint test token")
}

pub fn doctor_token(config: &Config, doctor_id: &str) -> String {
    token_for(config, doctor_id, ROLE_DOCTOR)
}

pub fn patient_token(config: &Config, patient_id: &str) -> String {
    token_for(config, patient_id, ROLE_PATIENT)
}

/// Sends an authenticated JSON request and returns (status, parsed body).
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));

    let request = if let Some(body) = body {
        builder = builder.header("content-type", "application/json");
        builder.body(Body::from(body.to_string())).unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}

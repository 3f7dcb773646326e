use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // The UI is a browser SPA served from another origin
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Protected endpoints (require JWT)
        .nest(
            "/api/sessions",
            sessions_routes()
                .layer(cors.clone())
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/memory",
            memory_routes()
                .layer(cors.clone())
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/art",
            art_routes()
                .layer(cors.clone())
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/evaluation",
            evaluation_routes()
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn sessions_routes() -> Router<std::sync::Arc<services::AppState>> {
    // Scheduling a session is a clinician action; the rest of the lifecycle
    // is shared between the clinician and the patient.
    let doctor_routes = Router::new()
        .route("/", post(handlers::sessions::create_session))
        .route_layer(middleware::from_fn(
            middlewares::auth::doctor_guard_middleware,
        ));

    Router::new()
        .route(
            "/{id}",
            axum::routing::patch(handlers::sessions::patch_session)
                .delete(handlers::sessions::delete_session),
        )
        .route("/{id}/status", get(handlers::sessions::get_session_status))
        .route("/{id}/complete", post(handlers::sessions::complete_session))
        .route("/{id}/results", get(handlers::sessions::get_results))
        .route(
            "/{id}/interruption/stream",
            get(handlers::sse::interruption_stream),
        )
        .merge(doctor_routes)
}

fn memory_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/save", post(handlers::activity::save_memory))
}

fn art_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/save", post(handlers::activity::save_art))
}

fn evaluation_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/create", post(handlers::evaluation::create_evaluation))
        .route(
            "/progress/{session_id}",
            get(handlers::evaluation::get_progress),
        )
        .route(
            "/objective-question",
            post(handlers::evaluation::submit_objective),
        )
        .route(
            "/art-exploration/story-open-question",
            post(handlers::evaluation::submit_story_open),
        )
        .route(
            "/art-exploration/chronological-order-question",
            post(handlers::evaluation::submit_chronology),
        )
        .route(
            "/memory-reconstruction/select-image-question",
            post(handlers::evaluation::submit_select_image),
        )
}

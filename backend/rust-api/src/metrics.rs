use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sessions_total",
        "Total number of therapy sessions by lifecycle event",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sessions_active",
        "Number of sessions currently between start and completion"
    )
    .unwrap();

    pub static ref EVALUATIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "evaluations_created_total",
        "Total number of evaluation create/resume calls",
        &["outcome"]
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of evaluation answers submitted",
        &["question", "outcome"]
    )
    .unwrap();

    pub static ref COLLABORATOR_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "collaborator_requests_total",
        "Total number of AI collaborator requests",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active interruption-countdown SSE connections"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

pub fn record_answer(question: &str, outcome: &str) {
    ANSWERS_SUBMITTED_TOTAL
        .with_label_values(&[question, outcome])
        .inc();
}

pub fn record_collaborator_request(operation: &str, ok: bool) {
    let status = if ok { "success" } else { "error" };
    COLLABORATOR_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

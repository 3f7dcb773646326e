use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::session::SessionStatus;

/// Error taxonomy shared by every handler and service.
///
/// Lifecycle violations and duplicate answers are client-recoverable and map
/// to 409; `NotCompleted` is a "not yet" state (412) rather than a failure;
/// collaborator outages surface as 502 and are safe to retry because no step
/// counter lives on the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("step already answered: {step}")]
    AlreadyAnswered { step: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("session is not completed")]
    NotCompleted,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("collaborator request failed: {0}")]
    Collaborator(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidTransition { .. } => "invalid_transition",
            ApiError::AlreadyAnswered { .. } => "already_answered",
            ApiError::NotFound(_) => "not_found",
            ApiError::NotCompleted => "not_completed",
            ApiError::Validation(_) => "validation_failure",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Collaborator(_) => "collaborator_failure",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ApiError::AlreadyAnswered { .. } => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotCompleted => StatusCode::PRECONDITION_FAILED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<mongodb::error::Error> for ApiError {
    fn from(err: mongodb::error::Error) -> Self {
        ApiError::Internal(anyhow::anyhow!("database error: {}", err))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", message);
        } else {
            tracing::debug!("request rejected ({}): {}", status, message);
        }

        let body = json!({
            "error": self.kind(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_map_to_409() {
        let err = ApiError::InvalidTransition {
            from: SessionStatus::Pending,
            to: SessionStatus::Completed,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = ApiError::AlreadyAnswered {
            step: "objective:emotion".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_completed_is_precondition_failed() {
        assert_eq!(
            ApiError::NotCompleted.status_code(),
            StatusCode::PRECONDITION_FAILED
        );
    }

    #[test]
    fn validation_resolves_before_any_io() {
        // Validation errors carry the offending message verbatim
        let err = ApiError::validation("interruption_time must be between 1 and 300");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("interruption_time"));
    }
}

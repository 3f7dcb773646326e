use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::session::{CreateSessionRequest, PatchSessionRequest, SessionResponse, SessionStatus},
    services::{
        evaluation_service::EvaluationService, results_service::ResultsService,
        session_service::SessionService, AppState,
    },
};

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    tracing::info!(
        "Creating session for patient {} (doctor {})",
        req.patient_id,
        claims.sub
    );

    let service = SessionService::new(state.mongo.clone());
    let session = service.create_session(&claims.sub, &req).await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

pub async fn get_session_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(state.mongo.clone());
    let session = service.get_session(&session_id).await?;
    service.guard_session_access(&claims, &session)?;

    let status = service.get_status(&session_id).await?;
    Ok(Json(status))
}

pub async fn patch_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<PatchSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(state.mongo.clone());
    let session = service.get_session(&session_id).await?;
    service.guard_session_access(&claims, &session)?;

    let updated = service.transition(&session_id, req.status).await?;
    Ok(Json(SessionResponse::from(updated)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(state.mongo.clone());
    service.delete_session(&session_id, &claims).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Final lifecycle step: only valid from `in_evaluation` with every step of
/// the evaluation answered.
pub async fn complete_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let evaluation_service =
        EvaluationService::new(state.mongo.clone(), state.config.ai_api_url.clone());
    let progress = evaluation_service.get_progress(&session_id, &claims).await?;

    if !progress.is_completed {
        tracing::info!(
            "Completion rejected for session {}: {}/{} steps answered",
            session_id,
            progress.current_step,
            progress.total_steps
        );
        return Err(ApiError::NotCompleted);
    }

    let session_service = SessionService::new(state.mongo.clone());
    session_service
        .transition(&session_id, SessionStatus::Completed)
        .await?;

    if let Some(eval_id) = &progress.eval_id {
        state
            .mongo
            .collection::<mongodb::bson::Document>("evaluations")
            .update_one(
                mongodb::bson::doc! { "_id": eval_id },
                mongodb::bson::doc! { "$set": { "completed": true } },
            )
            .await?;
    }

    Ok(Json(json!({
        "session_id": session_id,
        "status": "completed",
    })))
}

pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ResultsService::new(state.mongo.clone());
    let results = service.get_results(&session_id, &claims).await?;
    Ok(Json(results))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::answer::{
        SubmitChronologyRequest, SubmitObjectiveRequest, SubmitSelectImageRequest,
        SubmitStoryOpenRequest,
    },
    models::evaluation::CreateEvaluationResponse,
    services::{answer_service::AnswerService, evaluation_service::EvaluationService, AppState},
};

#[derive(Debug, Deserialize)]
pub struct CreateEvaluationQuery {
    pub session_id: Option<String>,
}

/// POST /api/evaluation/create?session_id=
///
/// Idempotent: a retry after an unacknowledged create returns the same id.
pub async fn create_evaluation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<CreateEvaluationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = query
        .session_id
        .ok_or_else(|| ApiError::validation("session_id query parameter is required"))?;

    let service = EvaluationService::new(state.mongo.clone(), state.config.ai_api_url.clone());
    let evaluation = service.create_or_resume(&session_id, &claims).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateEvaluationResponse { id: evaluation.id }),
    ))
}

pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = EvaluationService::new(state.mongo.clone(), state.config.ai_api_url.clone());
    let progress = service.get_progress(&session_id, &claims).await?;
    Ok(Json(progress))
}

pub async fn submit_objective(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitObjectiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let service = AnswerService::new(state.mongo.clone());
    let response = service.submit_objective(&claims, &req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn submit_story_open(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitStoryOpenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let service = AnswerService::new(state.mongo.clone());
    let response = service.submit_story_open(&claims, &req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn submit_chronology(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitChronologyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AnswerService::new(state.mongo.clone());
    let response = service.submit_chronology(&claims, &req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn submit_select_image(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitSelectImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let service = AnswerService::new(state.mongo.clone());
    let response = service.submit_select_image(&claims, &req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

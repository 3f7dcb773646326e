use axum::{
    extract::{Query, State},
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
    models::activity::{SaveArtRequest, SaveMemoryRequest},
    services::{activity_service::ActivityService, AppState},
};

/// Activity saves work with or without a session: attached to one during a
/// scheduled session, free-standing in practice mode.
#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub session_id: Option<String>,
}

pub async fn save_memory(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ActivityQuery>,
    AppJson(req): AppJson<SaveMemoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let service = ActivityService::new(state.mongo.clone(), state.config.ai_api_url.clone());
    let response = service
        .save_memory(query.session_id, &claims, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn save_art(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ActivityQuery>,
    AppJson(req): AppJson<SaveArtRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let service = ActivityService::new(state.mongo.clone(), state.config.ai_api_url.clone());
    let response = service.save_art(query.session_id, &claims, &req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

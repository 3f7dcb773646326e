use std::collections::HashSet;

use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::metrics::EVALUATIONS_CREATED_TOTAL;
use crate::middlewares::auth::JwtClaims;
use crate::models::activity::{ArtExploration, MemoryReconstruction};
use crate::models::answer::AnswerRecord;
use crate::models::evaluation::{
    derive_progress, step_sequence, Evaluation, ProgressResponse, SectionDistractors, Step,
};
use crate::models::session::{Session, SessionStatus};
use crate::services::ai_service::{self, AiService};
use crate::services::session_service::SessionService;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Creates evaluations and derives evaluation progress.
///
/// Progress is never stored: the current step is the count of answers that
/// exist for the evaluation's fixed step sequence. A client that crashes,
/// reloads or retries always lands back on the first unanswered step.
pub struct EvaluationService {
    mongo: Database,
    ai: AiService,
}

impl EvaluationService {
    pub fn new(mongo: Database, ai_api_url: String) -> Self {
        Self {
            mongo,
            ai: AiService::new(ai_api_url),
        }
    }

    /// Idempotent: the first call creates the evaluation (and advances the
    /// session to in_evaluation); every later call returns the same record.
    pub async fn create_or_resume(
        &self,
        session_id: &str,
        claims: &JwtClaims,
    ) -> Result<Evaluation, ApiError> {
        let session_service = SessionService::new(self.mongo.clone());
        let session = session_service.get_session(session_id).await?;
        session_service.guard_session_access(claims, &session)?;

        let collection = self.mongo.collection::<Evaluation>("evaluations");

        if let Some(existing) = collection.find_one(doc! { "session_id": session_id }).await? {
            // Recover the interrupted case where the evaluation landed but
            // the status update did not.
            if session.status == SessionStatus::InProgress {
                session_service
                    .transition(session_id, SessionStatus::InEvaluation)
                    .await?;
            }
            EVALUATIONS_CREATED_TOTAL
                .with_label_values(&["resumed"])
                .inc();
            tracing::info!(
                "Evaluation {} resumed for session {}",
                existing.id,
                session_id
            );
            return Ok(existing);
        }

        match session.status {
            SessionStatus::InProgress | SessionStatus::InEvaluation => {}
            other => {
                return Err(ApiError::InvalidTransition {
                    from: other,
                    to: SessionStatus::InEvaluation,
                });
            }
        }

        let pinned_distractors = if session.mode.includes_memory() {
            let record = self.memory_record(session_id).await?;
            self.pin_distractors(&record).await?
        } else {
            Vec::new()
        };

        if session.mode.includes_art() {
            // The art record carries the chronology reference; without it
            // the evaluation has nothing to score against.
            self.art_record(session_id).await?;
        }

        let evaluation = Evaluation {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            completed: false,
            pinned_distractors,
        };

        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection.insert_one(&evaluation).await
        })
        .await?;

        if session.status == SessionStatus::InProgress {
            session_service
                .transition(session_id, SessionStatus::InEvaluation)
                .await?;
        }

        EVALUATIONS_CREATED_TOTAL
            .with_label_values(&["created"])
            .inc();
        tracing::info!(
            "Evaluation {} created for session {}",
            evaluation.id,
            session_id
        );

        Ok(evaluation)
    }

    pub async fn get_progress(
        &self,
        session_id: &str,
        claims: &JwtClaims,
    ) -> Result<ProgressResponse, ApiError> {
        let session_service = SessionService::new(self.mongo.clone());
        let session = session_service.get_session(session_id).await?;
        session_service.guard_session_access(claims, &session)?;

        let collection = self.mongo.collection::<Evaluation>("evaluations");
        let Some(evaluation) = collection.find_one(doc! { "session_id": session_id }).await?
        else {
            return Ok(ProgressResponse {
                eval_id: None,
                evaluation_started: false,
                current_step: 0,
                total_steps: 0,
                is_completed: false,
                distractors: Vec::new(),
            });
        };

        let sequence = self.sequence_for(&session).await?;
        let answered = self.answered_step_keys(&evaluation.id).await?;
        let (current_step, is_completed) = derive_progress(&sequence, &answered);

        Ok(ProgressResponse {
            eval_id: Some(evaluation.id),
            evaluation_started: true,
            current_step,
            total_steps: sequence.len() as u32,
            is_completed,
            distractors: evaluation.pinned_distractors,
        })
    }

    /// The fixed step sequence for a session, with one recognition step per
    /// stored section.
    pub async fn sequence_for(&self, session: &Session) -> Result<Vec<Step>, ApiError> {
        let section_ids = if session.mode.includes_memory() {
            self.memory_record(&session.id)
                .await?
                .sections
                .iter()
                .map(|section| section.id.clone())
                .collect()
        } else {
            Vec::new()
        };
        Ok(step_sequence(session.mode, &section_ids))
    }

    pub async fn answered_step_keys(
        &self,
        evaluation_id: &str,
    ) -> Result<HashSet<String>, ApiError> {
        let cursor = self
            .mongo
            .collection::<AnswerRecord>("evaluation_answers")
            .find(doc! { "evaluation_id": evaluation_id })
            .await?;
        let answers: Vec<AnswerRecord> = cursor.try_collect().await?;
        Ok(answers.into_iter().map(|answer| answer.step_key).collect())
    }

    pub async fn memory_record(
        &self,
        session_id: &str,
    ) -> Result<MemoryReconstruction, ApiError> {
        self.mongo
            .collection::<MemoryReconstruction>("memory_reconstructions")
            .find_one(doc! { "session_id": session_id })
            .await?
            .ok_or(ApiError::NotFound("memory reconstruction"))
    }

    pub async fn art_record(&self, session_id: &str) -> Result<ArtExploration, ApiError> {
        self.mongo
            .collection::<ArtExploration>("art_explorations")
            .find_one(doc! { "session_id": session_id })
            .await?
            .ok_or(ApiError::NotFound("art exploration"))
    }

    /// Distractors are fixed here, at evaluation creation, so a resumed
    /// session re-presents exactly the images the patient first saw.
    async fn pin_distractors(
        &self,
        record: &MemoryReconstruction,
    ) -> Result<Vec<SectionDistractors>, ApiError> {
        let mut pinned = Vec::with_capacity(record.sections.len());

        for section in &record.sections {
            let distractor_ids = match self.ai.section_distractors(section).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(
                        "Distractor collaborator failed for section {} ({}), using candidate fallback",
                        section.id,
                        e
                    );
                    ai_service::fallback_distractors(section).ok_or(ApiError::Collaborator(
                        "no distractors available for recognition question".to_string(),
                    ))?
                }
            };

            pinned.push(SectionDistractors {
                section_id: section.id.clone(),
                distractor_ids,
            });
        }

        Ok(pinned)
    }
}

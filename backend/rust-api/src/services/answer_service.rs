use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::metrics::record_answer;
use crate::middlewares::auth::JwtClaims;
use crate::models::activity::{ArtExploration, MemoryReconstruction, Section};
use crate::models::answer::{
    score_chronology, AnswerDetail, AnswerRecord, ChronologyAnswerResponse,
    ObjectiveAnswerResponse, SelectImageAnswerResponse, StoryOpenAnswerResponse,
    SubmitChronologyRequest, SubmitObjectiveRequest, SubmitSelectImageRequest,
    SubmitStoryOpenRequest,
};
use crate::models::evaluation::{Evaluation, Step};
use crate::models::session::Session;
use crate::services::session_service::SessionService;
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::format_hms;

/// Persists evaluation answers, one operation per question type.
///
/// All four share the contract: the evaluation must exist and be open, a
/// step answers at most once ((evaluation_id, step_key) is the identity),
/// and the caller re-derives progress afterwards instead of counting
/// locally. `AlreadyAnswered` therefore means "advance", not "fail".
pub struct AnswerService {
    mongo: Database,
}

impl AnswerService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn submit_story_open(
        &self,
        claims: &JwtClaims,
        req: &SubmitStoryOpenRequest,
    ) -> Result<StoryOpenAnswerResponse, ApiError> {
        let (_, session) = self.open_evaluation(&req.eval_id, claims).await?;
        if !session.mode.includes_art() {
            return Err(ApiError::validation(
                "story question is not part of this evaluation",
            ));
        }

        let step = Step::StoryOpen;
        self.ensure_unanswered(&req.eval_id, &step.key()).await?;

        let record = self.answer_record(
            &req.eval_id,
            &step,
            req.elapsed_seconds,
            AnswerDetail::StoryOpen {
                text: req.text.clone(),
            },
        );
        self.insert_answer(&record, "story_open").await?;

        Ok(StoryOpenAnswerResponse {
            question_id: record.id,
        })
    }

    pub async fn submit_chronology(
        &self,
        claims: &JwtClaims,
        req: &SubmitChronologyRequest,
    ) -> Result<ChronologyAnswerResponse, ApiError> {
        // Local validation first, before any store round-trip
        let selected = req.selected();
        if selected.is_empty() {
            return Err(ApiError::validation("at least one event must be selected"));
        }

        let (_, session) = self.open_evaluation(&req.eval_id, claims).await?;
        if !session.mode.includes_art() {
            return Err(ApiError::validation(
                "chronology question is not part of this evaluation",
            ));
        }

        let step = Step::ChronologyOrder;
        self.ensure_unanswered(&req.eval_id, &step.key()).await?;

        let art = self.art_record(&session.id).await?;

        let (correct_positions, total_positions) =
            score_chronology(&selected, &art.chronology_events);

        let record = self.answer_record(
            &req.eval_id,
            &step,
            req.elapsed_seconds,
            AnswerDetail::ChronologyOrder {
                selected,
                reference: art.chronology_events.clone(),
                correct_positions,
                total_positions,
            },
        );
        self.insert_answer(&record, "chronology_order").await?;

        Ok(ChronologyAnswerResponse {
            question_id: record.id,
            is_fully_correct: total_positions > 0 && correct_positions == total_positions,
            correct_positions,
        })
    }

    pub async fn submit_select_image(
        &self,
        claims: &JwtClaims,
        req: &SubmitSelectImageRequest,
    ) -> Result<SelectImageAnswerResponse, ApiError> {
        let (_, session) = self.open_evaluation(&req.eval_id, claims).await?;
        if !session.mode.includes_memory() {
            return Err(ApiError::validation(
                "recognition question is not part of this evaluation",
            ));
        }

        let memory = self.memory_record(&session.id).await?;
        let section = section_by_id(&memory, &req.section_id)?;
        let favorite = section
            .favorite
            .as_ref()
            .ok_or_else(|| ApiError::validation("section has no favorite image to recognize"))?;

        let step = Step::SelectImage {
            section_id: req.section_id.clone(),
        };
        self.ensure_unanswered(&req.eval_id, &step.key()).await?;

        let is_correct = req.image_selected_id == favorite.id;

        // The distractors actually shown are recorded with the answer, so
        // scoring stays reproducible even if the pool is regenerated later.
        let record = self.answer_record(
            &req.eval_id,
            &step,
            req.elapsed_seconds,
            AnswerDetail::SelectImage {
                section_id: req.section_id.clone(),
                image_selected_id: req.image_selected_id.clone(),
                image_distractor_0_id: req.image_distractor_0_id.clone(),
                image_distractor_1_id: req.image_distractor_1_id.clone(),
                correct_image_id: favorite.id.clone(),
                is_correct,
            },
        );
        self.insert_answer(&record, "select_image").await?;

        Ok(SelectImageAnswerResponse {
            question_id: record.id,
            is_correct,
        })
    }

    pub async fn submit_objective(
        &self,
        claims: &JwtClaims,
        req: &SubmitObjectiveRequest,
    ) -> Result<ObjectiveAnswerResponse, ApiError> {
        // Local validation first, before any store round-trip
        if !req.options.contains(&req.selected_option) {
            return Err(ApiError::validation(
                "selected_option is not one of the offered options",
            ));
        }
        if !req.options.contains(&req.correct_option) {
            return Err(ApiError::validation(
                "correct_option is not one of the offered options",
            ));
        }

        self.open_evaluation(&req.eval_id, claims).await?;

        let step = Step::Objective {
            question_type: req.question_type,
        };
        self.ensure_unanswered(&req.eval_id, &step.key()).await?;

        let is_correct = req.selected_option == req.correct_option;
        let record = self.answer_record(
            &req.eval_id,
            &step,
            req.elapsed_seconds,
            AnswerDetail::Objective {
                question_type: req.question_type,
                options: req.options.clone(),
                selected_option: req.selected_option.clone(),
                correct_option: req.correct_option.clone(),
                is_correct,
            },
        );
        self.insert_answer(&record, "objective").await?;

        Ok(ObjectiveAnswerResponse { id: record.id })
    }

    /// Loads the evaluation and its session, checks the caller belongs to
    /// the session, and rejects submissions into a completed evaluation.
    async fn open_evaluation(
        &self,
        eval_id: &str,
        claims: &JwtClaims,
    ) -> Result<(Evaluation, Session), ApiError> {
        let evaluation = self
            .mongo
            .collection::<Evaluation>("evaluations")
            .find_one(doc! { "_id": eval_id })
            .await?
            .ok_or(ApiError::NotFound("evaluation"))?;

        let session_service = SessionService::new(self.mongo.clone());
        let session = session_service.get_session(&evaluation.session_id).await?;
        session_service.guard_session_access(claims, &session)?;

        if evaluation.completed {
            return Err(ApiError::validation("evaluation is already completed"));
        }

        Ok((evaluation, session))
    }

    async fn ensure_unanswered(&self, eval_id: &str, step_key: &str) -> Result<(), ApiError> {
        let existing = self
            .mongo
            .collection::<AnswerRecord>("evaluation_answers")
            .find_one(doc! { "evaluation_id": eval_id, "step_key": step_key })
            .await?;

        if existing.is_some() {
            tracing::info!(
                "Duplicate answer rejected: evaluation={} step={}",
                eval_id,
                step_key
            );
            return Err(ApiError::AlreadyAnswered {
                step: step_key.to_string(),
            });
        }
        Ok(())
    }

    fn answer_record(
        &self,
        eval_id: &str,
        step: &Step,
        elapsed_seconds: u32,
        detail: AnswerDetail,
    ) -> AnswerRecord {
        AnswerRecord {
            id: Uuid::new_v4().to_string(),
            evaluation_id: eval_id.to_string(),
            step_key: step.key(),
            elapsed_time: format_hms(elapsed_seconds),
            created_at: Utc::now(),
            detail,
        }
    }

    async fn insert_answer(&self, record: &AnswerRecord, question: &str) -> Result<(), ApiError> {
        let collection = self.mongo.collection::<AnswerRecord>("evaluation_answers");
        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection.insert_one(record).await
        })
        .await?;

        record_answer(question, "accepted");
        tracing::info!(
            "Answer {} stored: evaluation={} step={}",
            record.id,
            record.evaluation_id,
            record.step_key
        );
        Ok(())
    }

    async fn memory_record(&self, session_id: &str) -> Result<MemoryReconstruction, ApiError> {
        self.mongo
            .collection::<MemoryReconstruction>("memory_reconstructions")
            .find_one(doc! { "session_id": session_id })
            .await?
            .ok_or(ApiError::NotFound("memory reconstruction"))
    }

    async fn art_record(&self, session_id: &str) -> Result<ArtExploration, ApiError> {
        self.mongo
            .collection::<ArtExploration>("art_explorations")
            .find_one(doc! { "session_id": session_id })
            .await?
            .ok_or(ApiError::NotFound("art exploration"))
    }
}

fn section_by_id<'a>(
    memory: &'a MemoryReconstruction,
    section_id: &str,
) -> Result<&'a Section, ApiError> {
    memory
        .sections
        .iter()
        .find(|section| section.id == section_id)
        .ok_or(ApiError::NotFound("section"))
}

use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;

use crate::errors::ApiError;
use crate::middlewares::auth::JwtClaims;
use crate::models::activity::MemoryReconstruction;
use crate::models::answer::{AnswerDetail, AnswerRecord};
use crate::models::evaluation::{Evaluation, OBJECTIVE_SEQUENCE};
use crate::models::results::{overall_accuracy, Category, CategoryScore, SessionResults};
use crate::models::session::{SessionMode, SessionStatus};
use crate::services::session_service::SessionService;

/// Scores a completed evaluation from its raw stored answers.
pub struct ResultsService {
    mongo: Database,
}

impl ResultsService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn get_results(
        &self,
        session_id: &str,
        claims: &JwtClaims,
    ) -> Result<SessionResults, ApiError> {
        let session_service = SessionService::new(self.mongo.clone());
        let session = session_service.get_session(session_id).await?;
        session_service.guard_session_access(claims, &session)?;

        if session.status != SessionStatus::Completed {
            return Err(ApiError::NotCompleted);
        }

        let evaluation = self
            .mongo
            .collection::<Evaluation>("evaluations")
            .find_one(doc! { "session_id": session_id })
            .await?
            .ok_or(ApiError::NotFound("evaluation"))?;

        let answers: Vec<AnswerRecord> = self
            .mongo
            .collection::<AnswerRecord>("evaluation_answers")
            .find(doc! { "evaluation_id": &evaluation.id })
            .await?
            .try_collect()
            .await?;

        let section_total = if session.mode.includes_memory() {
            self.mongo
                .collection::<MemoryReconstruction>("memory_reconstructions")
                .find_one(doc! { "session_id": session_id })
                .await?
                .map(|record| record.sections.len() as u32)
                .unwrap_or(0)
        } else {
            0
        };

        let categories = tally_categories(session.mode, section_total, &answers);
        let overall = overall_accuracy(&categories);

        Ok(SessionResults {
            session_id: session.id,
            mode: session.mode,
            categories,
            overall_accuracy: overall,
        })
    }
}

/// Per-category counts from raw answers. Story answers are open-ended and
/// contribute no scored category.
fn tally_categories(
    mode: SessionMode,
    section_total: u32,
    answers: &[AnswerRecord],
) -> Vec<CategoryScore> {
    let mut categories = Vec::new();

    if mode.includes_memory() {
        let correct = answers
            .iter()
            .filter(|answer| {
                matches!(
                    answer.detail,
                    AnswerDetail::SelectImage {
                        is_correct: true,
                        ..
                    }
                )
            })
            .count() as u32;
        categories.push(CategoryScore::new(
            Category::ImageRecognition,
            correct,
            section_total,
        ));
    }

    if mode.includes_art() {
        let (correct, total) = answers
            .iter()
            .find_map(|answer| match &answer.detail {
                AnswerDetail::ChronologyOrder {
                    correct_positions,
                    total_positions,
                    ..
                } => Some((*correct_positions, *total_positions)),
                _ => None,
            })
            .unwrap_or((0, 0));
        categories.push(CategoryScore::new(Category::Chronology, correct, total));
    }

    let objective_correct = answers
        .iter()
        .filter(|answer| {
            matches!(
                answer.detail,
                AnswerDetail::Objective {
                    is_correct: true,
                    ..
                }
            )
        })
        .count() as u32;
    categories.push(CategoryScore::new(
        Category::Objective,
        objective_correct,
        OBJECTIVE_SEQUENCE.len() as u32,
    ));

    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::evaluation::ObjectiveKind;
    use chrono::Utc;

    fn answer(detail: AnswerDetail) -> AnswerRecord {
        AnswerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            evaluation_id: "eval-1".to_string(),
            step_key: "step".to_string(),
            elapsed_time: "00:00:10".to_string(),
            created_at: Utc::now(),
            detail,
        }
    }

    fn objective(kind: ObjectiveKind, is_correct: bool) -> AnswerRecord {
        answer(AnswerDetail::Objective {
            question_type: kind,
            options: vec!["a".to_string(), "b".to_string()],
            selected_option: "a".to_string(),
            correct_option: if is_correct { "a" } else { "b" }.to_string(),
            is_correct,
        })
    }

    fn select_image(section: &str, is_correct: bool) -> AnswerRecord {
        answer(AnswerDetail::SelectImage {
            section_id: section.to_string(),
            image_selected_id: "img-1".to_string(),
            image_distractor_0_id: "img-2".to_string(),
            image_distractor_1_id: "img-3".to_string(),
            correct_image_id: "img-1".to_string(),
            is_correct,
        })
    }

    #[test]
    fn art_mode_scores_chronology_and_objective_only() {
        let answers = vec![
            answer(AnswerDetail::StoryOpen {
                text: "a quiet afternoon".to_string(),
            }),
            answer(AnswerDetail::ChronologyOrder {
                selected: vec![],
                reference: vec![],
                correct_positions: 2,
                total_positions: 3,
            }),
            objective(ObjectiveKind::Environment, true),
            objective(ObjectiveKind::Period, false),
            objective(ObjectiveKind::Emotion, false),
        ];

        let categories = tally_categories(SessionMode::ArtExploration, 0, &answers);
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].category, Category::Chronology);
        assert_eq!((categories[0].correct, categories[0].total), (2, 3));
        assert_eq!(categories[1].category, Category::Objective);
        assert_eq!((categories[1].correct, categories[1].total), (1, 3));

        // (2/3, 1/3) -> 50%, the unweighted mean
        assert!((overall_accuracy(&categories) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn memory_mode_scores_recognition_over_section_count() {
        let answers = vec![
            select_image("s1", true),
            select_image("s2", false),
            select_image("s3", true),
            objective(ObjectiveKind::Environment, true),
            objective(ObjectiveKind::Period, true),
            objective(ObjectiveKind::Emotion, false),
        ];

        let categories = tally_categories(SessionMode::MemoryReconstruction, 3, &answers);
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].category, Category::ImageRecognition);
        assert_eq!((categories[0].correct, categories[0].total), (2, 3));
        assert_eq!((categories[1].correct, categories[1].total), (2, 3));
    }

    #[test]
    fn both_mode_scores_three_categories() {
        let answers = vec![
            select_image("s1", true),
            answer(AnswerDetail::ChronologyOrder {
                selected: vec![],
                reference: vec![],
                correct_positions: 1,
                total_positions: 4,
            }),
            objective(ObjectiveKind::Environment, true),
            objective(ObjectiveKind::Period, false),
            objective(ObjectiveKind::Emotion, false),
        ];

        let categories = tally_categories(SessionMode::Both, 1, &answers);
        let names: Vec<Category> = categories.iter().map(|c| c.category).collect();
        assert_eq!(
            names,
            vec![
                Category::ImageRecognition,
                Category::Chronology,
                Category::Objective
            ]
        );

        // (100 + 25 + 33.33) / 3
        let overall = overall_accuracy(&categories);
        assert!((overall - (100.0 + 25.0 + 100.0 / 3.0) / 3.0).abs() < 1e-9);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::evaluation::ObjectiveKind;

/// One stored evaluation answer. `step_key` identifies the step inside the
/// evaluation (see `Step::key`); the (evaluation_id, step_key) pair is the
/// unit of the at-most-once guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub evaluation_id: String,
    pub step_key: String,
    /// Time spent on the step, stored as HH:MM:SS.
    pub elapsed_time: String,
    pub created_at: DateTime<Utc>,
    pub detail: AnswerDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerDetail {
    StoryOpen {
        text: String,
    },
    ChronologyOrder {
        selected: Vec<String>,
        /// Reference order pinned on the art record at save time; copied
        /// here so the stored score never shifts under a regenerated pool.
        reference: Vec<String>,
        correct_positions: u32,
        total_positions: u32,
    },
    SelectImage {
        section_id: String,
        image_selected_id: String,
        image_distractor_0_id: String,
        image_distractor_1_id: String,
        correct_image_id: String,
        is_correct: bool,
    },
    Objective {
        question_type: ObjectiveKind,
        options: Vec<String>,
        selected_option: String,
        correct_option: String,
        is_correct: bool,
    },
}

/// Per-position match of a chronology answer against the reference order.
/// Returns (correct, total); total is the reference length, so missing
/// selections count as wrong positions.
pub fn score_chronology(selected: &[String], reference: &[String]) -> (u32, u32) {
    let total = reference.len() as u32;
    let correct = reference
        .iter()
        .enumerate()
        .filter(|(i, event)| selected.get(*i) == Some(event))
        .count() as u32;
    (correct, total)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitObjectiveRequest {
    pub eval_id: String,
    pub question_type: ObjectiveKind,
    #[validate(length(min = 2, message = "an objective question needs at least 2 options"))]
    pub options: Vec<String>,
    pub selected_option: String,
    pub correct_option: String,
    pub elapsed_seconds: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitStoryOpenRequest {
    pub eval_id: String,
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
    pub elapsed_seconds: u32,
}

/// Up to four ordered selections; trailing slots may be omitted.
#[derive(Debug, Deserialize)]
pub struct SubmitChronologyRequest {
    pub eval_id: String,
    pub selected_option_0: Option<String>,
    pub selected_option_1: Option<String>,
    pub selected_option_2: Option<String>,
    pub selected_option_3: Option<String>,
    pub elapsed_seconds: u32,
}

impl SubmitChronologyRequest {
    pub fn selected(&self) -> Vec<String> {
        [
            &self.selected_option_0,
            &self.selected_option_1,
            &self.selected_option_2,
            &self.selected_option_3,
        ]
        .into_iter()
        .filter_map(|option| option.clone())
        .collect()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitSelectImageRequest {
    pub eval_id: String,
    #[validate(length(min = 1, message = "section_id must not be empty"))]
    pub section_id: String,
    pub image_selected_id: String,
    pub image_distractor_0_id: String,
    pub image_distractor_1_id: String,
    pub elapsed_seconds: u32,
}

#[derive(Debug, Serialize)]
pub struct ObjectiveAnswerResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct StoryOpenAnswerResponse {
    pub question_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChronologyAnswerResponse {
    pub question_id: String,
    pub is_fully_correct: bool,
    pub correct_positions: u32,
}

#[derive(Debug, Serialize)]
pub struct SelectImageAnswerResponse {
    pub question_id: String,
    pub is_correct: bool,
}

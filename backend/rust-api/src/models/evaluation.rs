use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionMode;

/// The three objective questions every evaluation ends with, in order.
pub const OBJECTIVE_SEQUENCE: [ObjectiveKind; 3] = [
    ObjectiveKind::Environment,
    ObjectiveKind::Period,
    ObjectiveKind::Emotion,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    Environment,
    Period,
    Emotion,
}

impl ObjectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveKind::Environment => "environment",
            ObjectiveKind::Period => "period",
            ObjectiveKind::Emotion => "emotion",
        }
    }
}

/// Post-activity evaluation. Exactly one exists per session; creating it
/// twice returns the existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(rename = "_id")]
    pub id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    /// Distractor images pinned per section when the evaluation is created,
    /// so a resumed session re-presents the same recognition choices.
    #[serde(default)]
    pub pinned_distractors: Vec<SectionDistractors>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDistractors {
    pub section_id: String,
    pub distractor_ids: [String; 2],
}

/// One question slot in an evaluation's fixed sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    StoryOpen,
    ChronologyOrder,
    SelectImage { section_id: String },
    Objective { question_type: ObjectiveKind },
}

impl Step {
    /// Stable identity of the step inside its evaluation; answers are keyed
    /// by (evaluation_id, step_key), which is what makes resubmission
    /// detectable.
    pub fn key(&self) -> String {
        match self {
            Step::StoryOpen => "story_open".to_string(),
            Step::ChronologyOrder => "chronology_order".to_string(),
            Step::SelectImage { section_id } => format!("select_image:{section_id}"),
            Step::Objective { question_type } => format!("objective:{}", question_type.as_str()),
        }
    }
}

/// The fixed step sequence for an activity type. Section ids must be in
/// section order; they drive one recognition question each.
pub fn step_sequence(mode: SessionMode, section_ids: &[String]) -> Vec<Step> {
    let mut steps = Vec::new();

    if mode.includes_art() {
        steps.push(Step::StoryOpen);
        steps.push(Step::ChronologyOrder);
    }

    if mode.includes_memory() {
        for section_id in section_ids {
            steps.push(Step::SelectImage {
                section_id: section_id.clone(),
            });
        }
    }

    for question_type in OBJECTIVE_SEQUENCE {
        steps.push(Step::Objective { question_type });
    }

    steps
}

/// Derive position from stored answers: the current step index is the count
/// of answered steps, so progress survives reloads and crashes without any
/// persisted cursor.
pub fn derive_progress(sequence: &[Step], answered_keys: &HashSet<String>) -> (u32, bool) {
    let answered = sequence
        .iter()
        .filter(|step| answered_keys.contains(&step.key()))
        .count() as u32;
    (answered, answered as usize == sequence.len())
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub eval_id: Option<String>,
    pub evaluation_started: bool,
    pub current_step: u32,
    pub total_steps: u32,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub distractors: Vec<SectionDistractors>,
}

#[derive(Debug, Serialize)]
pub struct CreateEvaluationResponse {
    pub id: String,
}

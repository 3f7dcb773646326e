use serde::{Deserialize, Serialize};

use super::session::SessionMode;

/// Scored answer categories. Story answers are open-ended and never scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ImageRecognition,
    Chronology,
    Objective,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub correct: u32,
    pub total: u32,
    /// Percentage, 0.0-100.0.
    pub accuracy: f64,
}

impl CategoryScore {
    pub fn new(category: Category, correct: u32, total: u32) -> Self {
        let accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64 * 100.0
        };
        Self {
            category,
            correct,
            total,
            accuracy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResults {
    pub session_id: String,
    pub mode: SessionMode,
    pub categories: Vec<CategoryScore>,
    /// Unweighted mean of category accuracies, so a category with more
    /// questions cannot dominate the overall score.
    pub overall_accuracy: f64,
}

pub fn overall_accuracy(categories: &[CategoryScore]) -> f64 {
    if categories.is_empty() {
        return 0.0;
    }
    categories.iter().map(|c| c.accuracy).sum::<f64>() / categories.len() as f64
}

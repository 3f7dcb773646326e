use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MAX_SECTION_IMAGES: usize = 6;
pub const MAX_CHRONOLOGY_EVENTS: usize = 4;

/// Opaque reference to an image returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub url: String,
}

/// Memory-reconstruction activity record: a segmented story with candidate
/// images per section. Created once when the activity phase is saved,
/// immutable afterward except for deletion with its session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryReconstruction {
    #[serde(rename = "_id")]
    pub id: String,
    pub session_id: Option<String>,
    pub patient_id: String,
    pub story: String,
    pub language: String,
    pub dataset: String,
    pub segmentation: String,
    pub sections: Vec<Section>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub text: String,
    /// Up to 6 candidate images proposed for this section.
    pub images: Vec<ImageRef>,
    /// The image the patient designated, null until chosen.
    pub favorite: Option<ImageRef>,
}

/// Art-exploration activity record: selected images and the story generated
/// from them. The chronology reference order is captured once at save time
/// so later scoring never depends on a regenerated event pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtExploration {
    #[serde(rename = "_id")]
    pub id: String,
    pub session_id: Option<String>,
    pub patient_id: String,
    pub dataset: String,
    pub language: String,
    pub story: String,
    pub images_selected: Vec<ImageRef>,
    /// Reference order for the chronology question, up to 4 event labels.
    pub chronology_events: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveMemoryRequest {
    #[validate(length(min = 1, message = "story must not be empty"))]
    pub story: String,
    pub language: String,
    pub dataset: String,
    pub segmentation: String,
    #[validate(length(min = 1, message = "at least one section is required"), nested)]
    pub sections: Vec<SaveSectionRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SaveSectionRequest {
    #[validate(length(min = 1, message = "section text must not be empty"))]
    pub text: String,
    #[validate(length(max = 6, message = "a section holds at most 6 candidate images"))]
    pub images: Vec<ImageRef>,
    pub favorite: Option<ImageRef>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveArtRequest {
    pub dataset: String,
    pub language: String,
    #[validate(length(min = 1, message = "story must not be empty"))]
    pub story: String,
    #[validate(length(min = 1, message = "at least one selected image is required"))]
    pub images_selected: Vec<ImageRef>,
}

#[derive(Debug, Serialize)]
pub struct SaveMemoryResponse {
    pub id: String,
    pub sections: Vec<SavedSection>,
}

#[derive(Debug, Serialize)]
pub struct SavedSection {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SaveArtResponse {
    pub id: String,
}

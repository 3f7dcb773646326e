use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One scheduled clinical activity instance for a patient.
///
/// Owned by the clinician who created it; mutated by the patient during the
/// activity and evaluation phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub mode: SessionMode,
    pub interruption_time_seconds: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    MemoryReconstruction,
    ArtExploration,
    Both,
}

impl SessionMode {
    pub fn includes_memory(&self) -> bool {
        matches!(self, SessionMode::MemoryReconstruction | SessionMode::Both)
    }

    pub fn includes_art(&self) -> bool {
        matches!(self, SessionMode::ArtExploration | SessionMode::Both)
    }
}

/// Session lifecycle status. The order of the variants is the order of the
/// lifecycle: a session only ever advances to the immediate successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    InEvaluation,
    Completed,
}

impl SessionStatus {
    /// The only status this one may advance to, if any.
    pub fn successor(&self) -> Option<SessionStatus> {
        match self {
            SessionStatus::Pending => Some(SessionStatus::InProgress),
            SessionStatus::InProgress => Some(SessionStatus::InEvaluation),
            SessionStatus::InEvaluation => Some(SessionStatus::Completed),
            SessionStatus::Completed => None,
        }
    }

    pub fn can_advance_to(&self, next: SessionStatus) -> bool {
        self.successor() == Some(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::InEvaluation => "in_evaluation",
            SessionStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, message = "patient_id must not be empty"))]
    pub patient_id: String,
    pub mode: SessionMode,
    #[validate(range(
        min = 1,
        max = 300,
        message = "interruption_time must be between 1 and 300 seconds"
    ))]
    pub interruption_time: u32,
}

/// PATCH /api/sessions/{id} body. `started_at` is accepted for wire
/// compatibility but ignored: the server stamps its own clock.
#[derive(Debug, Deserialize)]
pub struct PatchSessionRequest {
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
}

/// API view of a session; storage uses `_id`, the wire uses `session_id`.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub mode: SessionMode,
    pub interruption_time: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            patient_id: session.patient_id,
            doctor_id: session.doctor_id,
            mode: session.mode,
            interruption_time: session.interruption_time_seconds,
            status: session.status,
            created_at: session.created_at,
            started_at: session.started_at,
            ended_at: session.ended_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub mode: SessionMode,
    pub interruption_time: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_reconstruction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_exploration_id: Option<String>,
}

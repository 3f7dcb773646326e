use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::middlewares::auth::JwtClaims;
use crate::models::activity::{
    ArtExploration, MemoryReconstruction, SaveArtRequest, SaveArtResponse, SaveMemoryRequest,
    SaveMemoryResponse, SavedSection, Section,
};
use crate::models::session::{Session, SessionStatus};
use crate::services::ai_service::{self, AiService};
use crate::services::session_service::SessionService;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Persists activity records. One save path serves both the in-session flow
/// and free-standing practice: a session id is a branch, not a fork.
pub struct ActivityService {
    mongo: Database,
    ai: AiService,
}

impl ActivityService {
    pub fn new(mongo: Database, ai_api_url: String) -> Self {
        Self {
            mongo,
            ai: AiService::new(ai_api_url),
        }
    }

    pub async fn save_memory(
        &self,
        session_id: Option<String>,
        claims: &JwtClaims,
        req: &SaveMemoryRequest,
    ) -> Result<SaveMemoryResponse, ApiError> {
        let collection = self
            .mongo
            .collection::<MemoryReconstruction>("memory_reconstructions");

        if let Some(ref sid) = session_id {
            let session = self.activity_session(sid, claims).await?;
            if !session.mode.includes_memory() {
                return Err(ApiError::validation(
                    "session mode does not include memory reconstruction",
                ));
            }

            // A retried save after an unacknowledged write returns the
            // record that already landed.
            if let Some(existing) = collection.find_one(doc! { "session_id": sid }).await? {
                tracing::info!(
                    "Memory reconstruction already saved for session {}, returning {}",
                    sid,
                    existing.id
                );
                return Ok(saved_memory_response(&existing));
            }
        }

        let sections: Vec<Section> = req
            .sections
            .iter()
            .map(|section| Section {
                id: Uuid::new_v4().to_string(),
                text: section.text.clone(),
                images: section.images.clone(),
                favorite: section.favorite.clone(),
            })
            .collect();

        let record = MemoryReconstruction {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            patient_id: claims.sub.clone(),
            story: req.story.clone(),
            language: req.language.clone(),
            dataset: req.dataset.clone(),
            segmentation: req.segmentation.clone(),
            sections,
            created_at: Utc::now(),
        };

        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection.insert_one(&record).await
        })
        .await?;

        tracing::info!(
            "Memory reconstruction {} saved ({} sections, session {:?})",
            record.id,
            record.sections.len(),
            session_id
        );

        Ok(saved_memory_response(&record))
    }

    pub async fn save_art(
        &self,
        session_id: Option<String>,
        claims: &JwtClaims,
        req: &SaveArtRequest,
    ) -> Result<SaveArtResponse, ApiError> {
        let collection = self.mongo.collection::<ArtExploration>("art_explorations");

        if let Some(ref sid) = session_id {
            let session = self.activity_session(sid, claims).await?;
            if !session.mode.includes_art() {
                return Err(ApiError::validation(
                    "session mode does not include art exploration",
                ));
            }

            if let Some(existing) = collection.find_one(doc! { "session_id": sid }).await? {
                tracing::info!(
                    "Art exploration already saved for session {}, returning {}",
                    sid,
                    existing.id
                );
                return Ok(SaveArtResponse { id: existing.id });
            }
        }

        // Pin the chronology reference order now, so a later regeneration of
        // the event pool cannot change what a stored answer is scored against.
        let chronology_events = match self.ai.chronology_events(&req.story).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    "Chronology collaborator failed ({}), falling back to sentence segmentation",
                    e
                );
                ai_service::fallback_chronology_events(&req.story)
            }
        };

        let record = ArtExploration {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            patient_id: claims.sub.clone(),
            dataset: req.dataset.clone(),
            language: req.language.clone(),
            story: req.story.clone(),
            images_selected: req.images_selected.clone(),
            chronology_events,
            created_at: Utc::now(),
        };

        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection.insert_one(&record).await
        })
        .await?;

        tracing::info!(
            "Art exploration {} saved ({} images, session {:?})",
            record.id,
            record.images_selected.len(),
            session_id
        );

        Ok(SaveArtResponse { id: record.id })
    }

    /// Loads the session an activity is being saved into and checks that it
    /// is actually in its activity phase.
    async fn activity_session(
        &self,
        session_id: &str,
        claims: &JwtClaims,
    ) -> Result<Session, ApiError> {
        let session_service = SessionService::new(self.mongo.clone());
        let session = session_service.get_session(session_id).await?;
        session_service.guard_session_access(claims, &session)?;

        if session.status != SessionStatus::InProgress {
            return Err(ApiError::InvalidTransition {
                from: session.status,
                to: SessionStatus::InProgress,
            });
        }

        Ok(session)
    }
}

fn saved_memory_response(record: &MemoryReconstruction) -> SaveMemoryResponse {
    SaveMemoryResponse {
        id: record.id.clone(),
        sections: record
            .sections
            .iter()
            .map(|section| SavedSection {
                id: section.id.clone(),
            })
            .collect(),
    }
}

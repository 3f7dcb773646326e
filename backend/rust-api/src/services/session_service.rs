use chrono::Utc;
use mongodb::bson::{doc, to_bson};
use mongodb::Database;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::middlewares::auth::JwtClaims;
use crate::models::activity::{ArtExploration, MemoryReconstruction};
use crate::models::session::{
    CreateSessionRequest, Session, SessionStatus, SessionStatusResponse,
};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

pub struct SessionService {
    mongo: Database,
}

impl SessionService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// A session may be read and mutated by the clinician who scheduled it
    /// and by the patient it was scheduled for; nobody else.
    pub fn guard_session_access(&self, claims: &JwtClaims, session: &Session) -> Result<(), ApiError> {
        if claims.sub == session.doctor_id || claims.sub == session.patient_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("not a participant of this session"))
        }
    }

    pub async fn create_session(
        &self,
        doctor_id: &str,
        req: &CreateSessionRequest,
    ) -> Result<Session, ApiError> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            patient_id: req.patient_id.clone(),
            doctor_id: doctor_id.to_string(),
            mode: req.mode,
            interruption_time_seconds: req.interruption_time,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        };

        let collection = self.mongo.collection::<Session>("sessions");
        retry_async_with_config(RetryConfig::default(), || async {
            collection.insert_one(&session).await
        })
        .await?;

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!(
            "Session created: {} for patient {} (mode {:?})",
            session.id,
            session.patient_id,
            session.mode
        );

        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        let collection = self.mongo.collection::<Session>("sessions");
        let session = collection
            .find_one(doc! { "_id": session_id })
            .await?
            .ok_or(ApiError::NotFound("session"))?;
        Ok(session)
    }

    pub async fn get_status(&self, session_id: &str) -> Result<SessionStatusResponse, ApiError> {
        let session = self.get_session(session_id).await?;

        let memory_reconstruction_id = self
            .mongo
            .collection::<MemoryReconstruction>("memory_reconstructions")
            .find_one(doc! { "session_id": session_id })
            .await?
            .map(|record| record.id);

        let art_exploration_id = self
            .mongo
            .collection::<ArtExploration>("art_explorations")
            .find_one(doc! { "session_id": session_id })
            .await?
            .map(|record| record.id);

        Ok(SessionStatusResponse {
            session_id: session.id,
            status: session.status,
            mode: session.mode,
            interruption_time: session.interruption_time_seconds,
            memory_reconstruction_id,
            art_exploration_id,
        })
    }

    /// Advance the session to `new_status`, enforcing the ordered lifecycle.
    ///
    /// A repeated transition to `in_progress` is a no-op so that a retried
    /// start request cannot fail or restamp `started_at`. Everything else
    /// must be the immediate successor of the current status.
    pub async fn transition(
        &self,
        session_id: &str,
        new_status: SessionStatus,
    ) -> Result<Session, ApiError> {
        let mut session = self.get_session(session_id).await?;

        if session.status == SessionStatus::InProgress && new_status == SessionStatus::InProgress {
            return Ok(session);
        }

        if !session.status.can_advance_to(new_status) {
            return Err(ApiError::InvalidTransition {
                from: session.status,
                to: new_status,
            });
        }

        let now = Utc::now();
        // Timestamps go through the same serde path as the typed model so
        // that reads never see a differently-encoded value.
        let now_bson = to_bson(&now).map_err(|e| anyhow::anyhow!("bson encode: {}", e))?;
        let mut update = doc! { "status": new_status.as_str() };

        if new_status == SessionStatus::InProgress && session.started_at.is_none() {
            session.started_at = Some(now);
            update.insert("started_at", now_bson.clone());
        }
        if new_status == SessionStatus::Completed {
            session.ended_at = Some(now);
            update.insert("ended_at", now_bson);
        }

        let collection = self.mongo.collection::<Session>("sessions");
        retry_async_with_config(RetryConfig::aggressive(), || async {
            collection
                .update_one(doc! { "_id": session_id }, doc! { "$set": update.clone() })
                .await
        })
        .await?;

        match new_status {
            SessionStatus::InProgress => {
                SESSIONS_TOTAL.with_label_values(&["started"]).inc();
                SESSIONS_ACTIVE.inc();
            }
            SessionStatus::Completed => {
                SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
                SESSIONS_ACTIVE.dec();
            }
            _ => {}
        }

        session.status = new_status;
        tracing::info!("Session {} advanced to {}", session_id, new_status);

        Ok(session)
    }

    /// Remove the session and everything hanging off it. Only the owning
    /// clinician may delete, and never while the patient is mid-activity.
    pub async fn delete_session(
        &self,
        session_id: &str,
        claims: &JwtClaims,
    ) -> Result<(), ApiError> {
        let session = self.get_session(session_id).await?;

        if claims.sub != session.doctor_id {
            return Err(ApiError::Forbidden("only the owning clinician may delete"));
        }
        if session.status == SessionStatus::InProgress {
            return Err(ApiError::Forbidden(
                "session cannot be deleted while in progress",
            ));
        }

        let evaluation = self
            .mongo
            .collection::<crate::models::Evaluation>("evaluations")
            .find_one(doc! { "session_id": session_id })
            .await?;

        if let Some(evaluation) = evaluation {
            self.mongo
                .collection::<mongodb::bson::Document>("evaluation_answers")
                .delete_many(doc! { "evaluation_id": &evaluation.id })
                .await?;
            self.mongo
                .collection::<mongodb::bson::Document>("evaluations")
                .delete_one(doc! { "_id": &evaluation.id })
                .await?;
        }

        self.mongo
            .collection::<mongodb::bson::Document>("memory_reconstructions")
            .delete_many(doc! { "session_id": session_id })
            .await?;
        self.mongo
            .collection::<mongodb::bson::Document>("art_explorations")
            .delete_many(doc! { "session_id": session_id })
            .await?;
        self.mongo
            .collection::<mongodb::bson::Document>("sessions")
            .delete_one(doc! { "_id": session_id })
            .await?;

        SESSIONS_TOTAL.with_label_values(&["deleted"]).inc();
        tracing::info!("Session {} deleted by {}", session_id, claims.sub);

        Ok(())
    }
}

// src/engine/mod.rs

//! The exam session engine.
//!
//! * `clock` - server-authoritative remaining time.
//! * `violation` - debounce and termination policy.
//! * `scoring` - deterministic grading against the answer key.
//! * `session` - lifecycle transitions (start, submit, violation).
//! * `query` - read-only result and dashboard views.

pub mod clock;
pub mod query;
pub mod scoring;
pub mod session;
pub mod violation;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{exam::Exam, session::ExamSession},
    store::{ExamCatalog, SessionRepository},
};

use self::{clock::Clock, violation::ViolationPolicy};

/// Write attempts before a contended mutation gives up with `Conflict`.
pub const CAS_ATTEMPTS: usize = 3;

/// Owns the collaborators every session operation needs.
pub struct ExamEngine {
    exams: Arc<dyn ExamCatalog>,
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    policy: ViolationPolicy,
}

impl ExamEngine {
    pub fn new(
        exams: Arc<dyn ExamCatalog>,
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        policy: ViolationPolicy,
    ) -> Self {
        Self {
            exams,
            sessions,
            clock,
            policy,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    pub fn catalog(&self) -> &Arc<dyn ExamCatalog> {
        &self.exams
    }

    async fn load_exam(&self, exam_id: i64) -> Result<Exam, AppError> {
        self.exams
            .find_exam(exam_id)
            .await?
            .ok_or(AppError::NotFound("Exam not found".to_string()))
    }

    /// Fetches a session and checks it belongs to `student_id`.
    async fn load_owned_session(
        &self,
        student_id: i64,
        session_id: i64,
    ) -> Result<ExamSession, AppError> {
        let session = self
            .sessions
            .find_session(session_id)
            .await?
            .ok_or(AppError::NotFound("Session not found".to_string()))?;

        if session.student_id != student_id {
            return Err(AppError::Forbidden(
                "This session belongs to another student".to_string(),
            ));
        }
        Ok(session)
    }
}

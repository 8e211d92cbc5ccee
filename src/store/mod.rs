// src/store/mod.rs

//! Persistence seam for the session engine.
//!
//! `ExamCatalog` fronts the exam-authoring and class-management side,
//! `SessionRepository` owns exam sessions. Both are implemented by the
//! Postgres store and by the in-process store.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        exam::{Exam, ExamSummary},
        session::ExamSession,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ExamCatalog: Send + Sync {
    /// Exam with its ordered questions and answer key.
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError>;

    async fn is_enrolled(&self, class_id: i64, student_id: i64) -> Result<bool, AppError>;

    /// Student ids enrolled in a class.
    async fn class_roster(&self, class_id: i64) -> Result<Vec<i64>, AppError>;

    /// Active exams a student may sit, newest start first.
    async fn list_open_exams(&self, student_id: i64, limit: i64)
    -> Result<Vec<ExamSummary>, AppError>;

    /// Adds minutes to both `duration` and `scheduled_end` in one write.
    /// Returns the updated exam, or `None` if it does not exist.
    async fn extend_exam(&self, exam_id: i64, extra_minutes: i32)
    -> Result<Option<Exam>, AppError>;

    /// Flips `is_active` to `active` only if it currently holds the opposite
    /// value. Returns `false` when the exam is missing or already in that state.
    async fn set_exam_active(&self, exam_id: i64, active: bool) -> Result<bool, AppError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_session(&self, session_id: i64) -> Result<Option<ExamSession>, AppError>;

    async fn find_sessions(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamSession>, AppError>;

    async fn sessions_for_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError>;

    async fn sessions_for_student(&self, student_id: i64) -> Result<Vec<ExamSession>, AppError>;

    /// Creates the session for the pair unless one exists. Returns the stored
    /// session and whether this call created it. Concurrent calls converge.
    async fn create_or_get(
        &self,
        student_id: i64,
        exam_id: i64,
        start_time: DateTime<Utc>,
    ) -> Result<(ExamSession, bool), AppError>;

    /// Writes every mutable field of `session` if the stored row still has
    /// `expected_version` and is in progress. Returns `false` when the guard
    /// fails; the stored row is then untouched.
    async fn compare_and_set(
        &self,
        session: &ExamSession,
        expected_version: i64,
    ) -> Result<bool, AppError>;
}

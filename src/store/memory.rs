// src/store/memory.rs

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{ExamCatalog, SessionRepository};
use crate::{
    error::AppError,
    models::{
        exam::{AccessType, Exam, ExamSummary},
        session::{ExamSession, SessionStatus},
    },
};

#[derive(Default)]
struct Inner {
    exams: HashMap<i64, Exam>,
    enrollments: HashSet<(i64, i64)>,
    sessions: HashMap<i64, ExamSession>,
    next_session_id: i64,
}

/// In-process store with the same guarantees as the Postgres one.
/// Every operation runs under a single lock, which makes CAS trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an exam.
    pub async fn put_exam(&self, exam: Exam) {
        self.inner.write().await.exams.insert(exam.id, exam);
    }

    pub async fn enroll(&self, class_id: i64, student_id: i64) {
        self.inner
            .write()
            .await
            .enrollments
            .insert((class_id, student_id));
    }

    /// Moves an exam's scheduled end, as an out-of-band edit would.
    pub async fn reschedule_end(&self, exam_id: i64, scheduled_end: DateTime<Utc>) {
        if let Some(exam) = self.inner.write().await.exams.get_mut(&exam_id) {
            exam.scheduled_end = scheduled_end;
        }
    }
}

#[async_trait]
impl ExamCatalog for MemoryStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.inner.read().await.exams.get(&exam_id).cloned())
    }

    async fn is_enrolled(&self, class_id: i64, student_id: i64) -> Result<bool, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .enrollments
            .contains(&(class_id, student_id)))
    }

    async fn class_roster(&self, class_id: i64) -> Result<Vec<i64>, AppError> {
        let inner = self.inner.read().await;
        let mut roster: Vec<i64> = inner
            .enrollments
            .iter()
            .filter(|(class, _)| *class == class_id)
            .map(|(_, student)| *student)
            .collect();
        roster.sort_unstable();
        Ok(roster)
    }

    async fn list_open_exams(
        &self,
        student_id: i64,
        limit: i64,
    ) -> Result<Vec<ExamSummary>, AppError> {
        let inner = self.inner.read().await;
        let mut exams: Vec<&Exam> = inner
            .exams
            .values()
            .filter(|e| e.is_active)
            .filter(|e| match (e.access_type, e.class_id) {
                (AccessType::Public, _) => true,
                (AccessType::Private, Some(class)) => {
                    inner.enrollments.contains(&(class, student_id))
                }
                (AccessType::Private, None) => false,
            })
            .collect();
        exams.sort_by(|a, b| b.scheduled_start.cmp(&a.scheduled_start));

        Ok(exams
            .into_iter()
            .take(limit.max(0) as usize)
            .map(Exam::summary)
            .collect())
    }

    async fn extend_exam(
        &self,
        exam_id: i64,
        extra_minutes: i32,
    ) -> Result<Option<Exam>, AppError> {
        let mut inner = self.inner.write().await;
        Ok(inner.exams.get_mut(&exam_id).map(|exam| {
            exam.duration_minutes += extra_minutes;
            exam.scheduled_end += Duration::minutes(i64::from(extra_minutes));
            exam.clone()
        }))
    }

    async fn set_exam_active(&self, exam_id: i64, active: bool) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        match inner.exams.get_mut(&exam_id) {
            Some(exam) if exam.is_active != active => {
                exam.is_active = active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn find_session(&self, session_id: i64) -> Result<Option<ExamSession>, AppError> {
        Ok(self.inner.read().await.sessions.get(&session_id).cloned())
    }

    async fn find_sessions(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamSession>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.student_id == student_id && s.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn sessions_for_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<ExamSession> = inner
            .sessions
            .values()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }

    async fn sessions_for_student(&self, student_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<ExamSession> = inner
            .sessions
            .values()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }

    async fn create_or_get(
        &self,
        student_id: i64,
        exam_id: i64,
        start_time: DateTime<Utc>,
    ) -> Result<(ExamSession, bool), AppError> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .sessions
            .values()
            .find(|s| s.student_id == student_id && s.exam_id == exam_id)
        {
            return Ok((existing.clone(), false));
        }

        inner.next_session_id += 1;
        let session = ExamSession::new(inner.next_session_id, student_id, exam_id, start_time);
        inner.sessions.insert(session.id, session.clone());
        Ok((session, true))
    }

    async fn compare_and_set(
        &self,
        session: &ExamSession,
        expected_version: i64,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.sessions.get_mut(&session.id) else {
            return Ok(false);
        };
        if stored.version != expected_version || stored.status != SessionStatus::InProgress {
            return Ok(false);
        }

        // Identity and start time are never rewritten.
        stored.status = session.status;
        stored.end_time = session.end_time;
        stored.answers = session.answers.clone();
        stored.score = session.score;
        stored.violation_count = session.violation_count;
        stored.violation_logs = session.violation_logs.clone();
        stored.last_violation_at = session.last_violation_at;
        stored.version = expected_version + 1;
        Ok(true)
    }
}

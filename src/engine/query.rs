// src/engine/query.rs

use std::cmp::Reverse;
use std::collections::HashMap;

use super::ExamEngine;
use crate::{
    config::AVAILABLE_EXAMS_LIMIT,
    error::AppError,
    models::{
        exam::Exam,
        session::{AvailableExam, ExamSession, ResultRow, SessionResult},
    },
};

/// Best attempt first: highest score, then most recent start.
fn rank_sessions(sessions: &mut [ExamSession]) {
    sessions.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.start_time.cmp(&a.start_time))
    });
}

impl ExamEngine {
    /// The student's frozen result for an exam.
    ///
    /// Withheld for everyone until the exam's scheduled end has passed, no
    /// matter when this student finished.
    pub async fn get_result(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<SessionResult, AppError> {
        let mut sessions = self.sessions.find_sessions(student_id, exam_id).await?;
        if sessions.is_empty() {
            return Err(AppError::NotFound("Exam attempt not found".to_string()));
        }
        rank_sessions(&mut sessions);

        let exam = self.load_exam(exam_id).await?;
        if self.now() < exam.scheduled_end {
            return Err(AppError::NotYetAvailable {
                scheduled_end: exam.scheduled_end,
            });
        }

        match sessions.into_iter().find(ExamSession::is_terminal) {
            Some(session) => Ok(SessionResult { session, exam }),
            None => {
                tracing::warn!(
                    student_id,
                    exam_id,
                    "Exam window closed with the session still in progress"
                );
                Err(AppError::StillInProgress(
                    "Exam is still in progress".to_string(),
                ))
            }
        }
    }

    /// Teacher dashboard: best attempt per student. Class-linked exams list
    /// the whole roster, absentees as `not-attended`.
    pub async fn exam_results(&self, exam: &Exam) -> Result<Vec<ResultRow>, AppError> {
        let mut sessions = self.sessions.sessions_for_exam(exam.id).await?;
        rank_sessions(&mut sessions);

        let mut best: HashMap<i64, ExamSession> = HashMap::new();
        for session in sessions {
            best.entry(session.student_id).or_insert(session);
        }

        let mut rows = Vec::new();
        if let Some(class_id) = exam.class_id {
            for student_id in self.exams.class_roster(class_id).await? {
                let row = match best.remove(&student_id) {
                    Some(session) => attended(session),
                    None => ResultRow {
                        student_id,
                        status: "not-attended".to_string(),
                        session: None,
                    },
                };
                rows.push(row);
            }
        }
        // Public exams, and attempts by students since removed from the class.
        rows.extend(best.into_values().map(attended));

        rows.sort_by_key(|row| {
            (
                row.session.is_none(),
                Reverse(row.session.as_ref().and_then(|s| s.score)),
                row.student_id,
            )
        });
        Ok(rows)
    }

    /// Active exams the student may sit, with their attempt state.
    pub async fn available_exams(&self, student_id: i64) -> Result<Vec<AvailableExam>, AppError> {
        let exams = self
            .exams
            .list_open_exams(student_id, AVAILABLE_EXAMS_LIMIT)
            .await?;

        let by_exam: HashMap<i64, ExamSession> = self
            .sessions
            .sessions_for_student(student_id)
            .await?
            .into_iter()
            .map(|s| (s.exam_id, s))
            .collect();

        Ok(exams
            .into_iter()
            .map(|exam| {
                let session = by_exam.get(&exam.id);
                AvailableExam {
                    status: session
                        .map(|s| s.status.to_string())
                        .unwrap_or_else(|| "not-started".to_string()),
                    score: session.and_then(|s| s.score),
                    session_start_time: session.map(|s| s.start_time),
                    exam,
                }
            })
            .collect())
    }
}

fn attended(session: ExamSession) -> ResultRow {
    ResultRow {
        student_id: session.student_id,
        status: session.status.to_string(),
        session: Some(session),
    }
}

// src/engine/session.rs

use chrono::{DateTime, Utc};

use super::{
    CAS_ATTEMPTS, ExamEngine, clock,
    scoring::{self, ScoreCard},
    violation::ViolationOutcome,
};
use crate::{
    error::AppError,
    models::{
        exam::AccessType,
        session::{
            AnswerSubmission, ExamSession, SessionStatus, SessionTime, StartedSession,
            SubmitOutcome, TimeSnapshot, ViolationLog, ViolationReport, ViolationType,
        },
    },
};

/// Moves a session into a terminal state with its frozen grade.
fn finalize(
    mut session: ExamSession,
    status: SessionStatus,
    now: DateTime<Utc>,
    card: ScoreCard,
) -> ExamSession {
    session.status = status;
    session.end_time = Some(now.max(session.start_time));
    session.answers = card.recorded;
    session.score = Some(card.score);
    session
}

fn terminal_message(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Terminated => "Session was terminated",
        _ => "Session already submitted",
    }
}

impl ExamEngine {
    /// Creates the attempt for (student, exam), or resumes the in-progress one.
    ///
    /// Resuming never touches `start_time`; the returned time snapshot is
    /// recomputed from it, so a resumed attempt keeps losing time while away.
    pub async fn start_session(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<StartedSession, AppError> {
        let exam = self.load_exam(exam_id).await?;

        if !exam.is_active {
            return Err(AppError::InvalidState("Exam is not active".to_string()));
        }

        let now = self.now();
        if !exam.is_open_at(now) {
            return Err(AppError::InvalidState(
                "Exam is not open at this time".to_string(),
            ));
        }

        if exam.access_type == AccessType::Private {
            let enrolled = match exam.class_id {
                Some(class_id) => self.exams.is_enrolled(class_id, student_id).await?,
                None => false,
            };
            if !enrolled {
                return Err(AppError::Forbidden(
                    "You are not enrolled in the class for this exam".to_string(),
                ));
            }
        }

        let (session, created) = self
            .sessions
            .create_or_get(student_id, exam_id, now)
            .await?;

        if session.is_terminal() {
            return Err(AppError::InvalidState(
                "You have already attempted this exam".to_string(),
            ));
        }

        let time = clock::reconcile(session.start_time, &exam, now);
        if created {
            tracing::info!(
                session_id = session.id,
                student_id,
                exam_id,
                "Exam session started"
            );
        } else {
            tracing::info!(
                session_id = session.id,
                remaining_seconds = time.remaining_seconds,
                "Exam session resumed"
            );
        }

        Ok(StartedSession {
            session,
            exam: exam.sanitized(),
            time,
            resumed: !created,
        })
    }

    /// Grades the supplied answers and closes the session as submitted.
    pub async fn submit_session(
        &self,
        student_id: i64,
        session_id: i64,
        answers: &[AnswerSubmission],
    ) -> Result<SubmitOutcome, AppError> {
        for attempt in 1..=CAS_ATTEMPTS {
            let session = self.load_owned_session(student_id, session_id).await?;
            if session.is_terminal() {
                return Err(AppError::InvalidState(
                    terminal_message(session.status).to_string(),
                ));
            }

            let exam = self.load_exam(session.exam_id).await?;
            let card = scoring::score(&exam, answers);
            let score = card.score;
            let correct_count = card.correct_count;
            let expected = session.version;
            let next = finalize(session, SessionStatus::Submitted, self.now(), card);

            if self.sessions.compare_and_set(&next, expected).await? {
                tracing::info!(session_id, score, "Exam session submitted");
                return Ok(SubmitOutcome {
                    message: "Exam submitted successfully".to_string(),
                    score,
                    correct_count,
                    total_marks: exam.total_marks,
                });
            }
            tracing::debug!(session_id, attempt, "Submit lost a write race, re-reading");
        }

        Err(AppError::Conflict(
            "Session is being modified concurrently, please retry".to_string(),
        ))
    }

    /// Records an integrity event, terminating the session when the policy says so.
    ///
    /// `answers` is the client's current answer set; it is graded only if this
    /// report terminates the session.
    pub async fn report_violation(
        &self,
        student_id: i64,
        session_id: i64,
        violation_type: ViolationType,
        answers: &[AnswerSubmission],
    ) -> Result<ViolationReport, AppError> {
        for attempt in 1..=CAS_ATTEMPTS {
            let session = self.load_owned_session(student_id, session_id).await?;
            if session.is_terminal() {
                return Err(AppError::InvalidState(
                    terminal_message(session.status).to_string(),
                ));
            }

            let now = self.now();
            let expected = session.version;

            let (count, terminate) = match self.policy.evaluate(&session, now) {
                ViolationOutcome::Debounced => {
                    tracing::debug!(session_id, ?violation_type, "Violation report debounced");
                    return Ok(ViolationReport {
                        message: "Duplicate report ignored".to_string(),
                        violation_count: session.violation_count,
                        accepted: false,
                        is_terminated: false,
                        score: None,
                    });
                }
                ViolationOutcome::Warning(count) => (count, false),
                ViolationOutcome::Terminate(count) => (count, true),
            };

            let mut next = session;
            next.violation_count = count;
            next.violation_logs.push(ViolationLog {
                violation_type,
                timestamp: now,
            });
            next.last_violation_at = Some(now);

            let mut score = None;
            if terminate {
                let exam = self.load_exam(next.exam_id).await?;
                let card = scoring::score(&exam, answers);
                score = Some(card.score);
                next = finalize(next, SessionStatus::Terminated, now, card);
            }

            if !self.sessions.compare_and_set(&next, expected).await? {
                tracing::debug!(session_id, attempt, "Violation lost a write race, re-reading");
                continue;
            }

            if terminate {
                tracing::warn!(
                    session_id,
                    student_id,
                    violation_count = count,
                    ?score,
                    "Exam session terminated after repeated violations"
                );
                return Ok(ViolationReport {
                    message: "Exam terminated due to violations. Your answers have been auto-submitted and evaluated.".to_string(),
                    violation_count: count,
                    accepted: true,
                    is_terminated: true,
                    score,
                });
            }

            tracing::info!(session_id, ?violation_type, violation_count = count, "Violation logged");
            return Ok(ViolationReport {
                message: format!(
                    "Violation logged. Warning {} of {}",
                    count, self.policy.max_tolerated
                ),
                violation_count: count,
                accepted: true,
                is_terminated: false,
                score: None,
            });
        }

        Err(AppError::Conflict(
            "Session is being modified concurrently, please retry".to_string(),
        ))
    }

    /// Periodic resync: the session's remaining time from server timestamps.
    pub async fn session_time(
        &self,
        student_id: i64,
        session_id: i64,
    ) -> Result<SessionTime, AppError> {
        let session = self.load_owned_session(student_id, session_id).await?;
        let exam = self.load_exam(session.exam_id).await?;
        let now = self.now();

        let time = if session.is_terminal() {
            let allowed_end = clock::allowed_end(
                session.start_time,
                exam.duration_minutes,
                exam.scheduled_end,
            );
            TimeSnapshot {
                server_now: now,
                allowed_end,
                remaining_seconds: 0,
                expired: true,
            }
        } else {
            clock::reconcile(session.start_time, &exam, now)
        };

        Ok(SessionTime {
            session_id,
            status: session.status,
            time,
        })
    }
}

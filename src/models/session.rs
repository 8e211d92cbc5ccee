// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use crate::models::exam::{Exam, SanitizedExam};

/// Largest answer payload accepted in one request.
pub const MAX_ANSWERS_PER_PAYLOAD: usize = 1000;

/// Lifecycle of an attempt. `Submitted` and `Terminated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    InProgress,
    Submitted,
    Terminated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in-progress",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-progress" => Ok(SessionStatus::InProgress),
            "submitted" => Ok(SessionStatus::Submitted),
            "terminated" => Ok(SessionStatus::Terminated),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integrity events a client can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    TabSwitch,
    FocusLoss,
    FullscreenExit,
    Other,
}

/// A recorded (question, selected option) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    pub question_id: i64,
    pub selected_option_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationLog {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub timestamp: DateTime<Utc>,
}

/// Represents the 'exam_sessions' table: one student's attempt at one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub status: SessionStatus,
    /// Server clock at creation. Never rewritten.
    pub start_time: DateTime<Utc>,
    /// Set once, on submission or termination.
    pub end_time: Option<DateTime<Utc>>,
    pub answers: Vec<RecordedAnswer>,
    /// `None` until the session is finalized.
    pub score: Option<i64>,
    pub violation_count: i32,
    pub violation_logs: Vec<ViolationLog>,
    /// Timestamp of the last accepted violation; the debounce reference.
    #[serde(skip)]
    pub last_violation_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by every successful write.
    #[serde(skip)]
    pub version: i64,
}

impl ExamSession {
    pub fn new(id: i64, student_id: i64, exam_id: i64, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            student_id,
            exam_id,
            status: SessionStatus::InProgress,
            start_time,
            end_time: None,
            answers: Vec::new(),
            score: None,
            violation_count: 0,
            violation_logs: Vec::new(),
            last_violation_at: None,
            version: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One answer as the client sends it. Options left blank are skipped.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerSubmission {
    pub question_id: i64,
    #[serde(default)]
    pub selected_option_id: Option<i64>,
}

fn validate_answers(answers: &[AnswerSubmission]) -> Result<(), ValidationError> {
    if answers.len() > MAX_ANSWERS_PER_PAYLOAD {
        return Err(ValidationError::new("too_many_answers"));
    }
    for answer in answers {
        if answer.question_id <= 0 || answer.selected_option_id.is_some_and(|id| id <= 0) {
            return Err(ValidationError::new("invalid_answer_id"));
        }
    }
    Ok(())
}

/// DTO for submitting a session.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitSessionRequest {
    #[serde(default)]
    #[validate(custom(function = validate_answers))]
    pub answers: Vec<AnswerSubmission>,
}

/// DTO for a violation report. The client piggybacks its current answers
/// since it may be cut off right after a terminating report.
#[derive(Debug, Deserialize, Validate)]
pub struct ViolationRequest {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    #[serde(default)]
    #[validate(custom(function = validate_answers))]
    pub answers: Vec<AnswerSubmission>,
}

/// Server-authoritative view of a session's remaining time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSnapshot {
    pub server_now: DateTime<Utc>,
    pub allowed_end: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub expired: bool,
}

/// Response of a start (or resume) request.
#[derive(Debug, Serialize)]
pub struct StartedSession {
    pub session: ExamSession,
    pub exam: SanitizedExam,
    pub time: TimeSnapshot,
    pub resumed: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionTime {
    pub session_id: i64,
    pub status: SessionStatus,
    #[serde(flatten)]
    pub time: TimeSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SubmitOutcome {
    pub message: String,
    pub score: i64,
    pub correct_count: usize,
    pub total_marks: i32,
}

#[derive(Debug, Serialize)]
pub struct ViolationReport {
    pub message: String,
    pub violation_count: i32,
    /// False when the report fell inside the debounce window.
    pub accepted: bool,
    pub is_terminated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

/// A finalized session with its exam, answer key included.
#[derive(Debug, Serialize)]
pub struct SessionResult {
    #[serde(flatten)]
    pub session: ExamSession,
    pub exam: Exam,
}

/// Student dashboard entry: an exam plus the student's attempt state.
#[derive(Debug, Serialize)]
pub struct AvailableExam {
    #[serde(flatten)]
    pub exam: crate::models::exam::ExamSummary,
    /// `not-started` or a session status.
    pub status: String,
    pub score: Option<i64>,
    pub session_start_time: Option<DateTime<Utc>>,
}

/// Teacher dashboard row.
#[derive(Debug, Serialize)]
pub struct ResultRow {
    pub student_id: i64,
    /// `not-attended` or a session status.
    pub status: String,
    pub session: Option<ExamSession>,
}

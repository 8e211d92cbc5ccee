// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Who may sit an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Public,
    /// Restricted to students enrolled in the exam's linked class.
    Private,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Public => "public",
            AccessType::Private => "private",
        }
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AccessType::Public),
            "private" => Ok(AccessType::Private),
            other => Err(format!("unknown access type '{}'", other)),
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable option of a question, including the answer key flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// Represents a row of the 'questions' table with its options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub options: Vec<AnswerOption>,
    /// Marks awarded for selecting a correct option.
    pub marks: i32,
}

impl Question {
    pub fn option(&self, option_id: i64) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

/// An exam together with its ordered questions and answer key.
///
/// Authored and published elsewhere; the session engine only reads it
/// (plus the extension and publish flag mutations exposed to teachers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub is_active: bool,
    pub access_type: AccessType,
    pub class_id: Option<i64>,
    pub created_by: i64,
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn question(&self, question_id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Sum of all question marks.
    pub fn question_marks_total(&self) -> i64 {
        self.questions.iter().map(|q| i64::from(q.marks)).sum()
    }

    /// Whether `now` lies inside `[scheduled_start, scheduled_end]`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.scheduled_start && now <= self.scheduled_end
    }

    /// Copy of the exam safe to hand to a student mid-attempt.
    pub fn sanitized(&self) -> SanitizedExam {
        SanitizedExam {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            duration_minutes: self.duration_minutes,
            total_marks: self.total_marks,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            questions: self
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    id: q.id,
                    text: q.text.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|o| PublicOption {
                            id: o.id,
                            text: o.text.clone(),
                        })
                        .collect(),
                    marks: q.marks,
                })
                .collect(),
        }
    }

    pub fn summary(&self) -> ExamSummary {
        ExamSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            duration_minutes: self.duration_minutes,
            total_marks: self.total_marks,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            access_type: self.access_type,
            class_id: self.class_id,
            question_count: self.questions.len(),
        }
    }
}

/// DTO for sending an option to the client (excludes `is_correct`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

/// DTO for sending a question to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<PublicOption>,
    pub marks: i32,
}

/// Exam as served while a session is in progress: no answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedExam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub questions: Vec<PublicQuestion>,
}

/// Exam header without questions, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub access_type: AccessType,
    pub class_id: Option<i64>,
    pub question_count: usize,
}

/// DTO for extending a running exam.
#[derive(Debug, Deserialize, Validate)]
pub struct ExtendExamRequest {
    #[validate(range(min = 1, max = 1440, message = "Extra minutes must be positive"))]
    pub extra_minutes: i32,
}

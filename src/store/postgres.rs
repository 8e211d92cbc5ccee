// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use super::{ExamCatalog, SessionRepository};
use crate::{
    error::AppError,
    models::{
        exam::{AnswerOption, Exam, ExamSummary, Question},
        session::{ExamSession, RecordedAnswer, SessionStatus, ViolationLog},
    },
};

const SESSION_COLUMNS: &str = "id, student_id, exam_id, status, start_time, end_time, answers, \
     score, violation_count, violation_logs, last_violation_at, version";

const EXAM_COLUMNS: &str = "id, title, description, duration_minutes, total_marks, \
     scheduled_start, scheduled_end, is_active, access_type, class_id, created_by";

/// Helper struct for reading the 'exams' table.
#[derive(FromRow)]
struct ExamRow {
    id: i64,
    title: String,
    description: Option<String>,
    duration_minutes: i32,
    total_marks: i32,
    scheduled_start: DateTime<Utc>,
    scheduled_end: DateTime<Utc>,
    is_active: bool,
    access_type: String,
    class_id: Option<i64>,
    created_by: i64,
}

impl ExamRow {
    fn into_exam(self, questions: Vec<Question>) -> Result<Exam, AppError> {
        Ok(Exam {
            id: self.id,
            title: self.title,
            description: self.description,
            duration_minutes: self.duration_minutes,
            total_marks: self.total_marks,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            is_active: self.is_active,
            access_type: self
                .access_type
                .parse()
                .map_err(AppError::InternalServerError)?,
            class_id: self.class_id,
            created_by: self.created_by,
            questions,
        })
    }
}

/// Helper struct for reading the 'questions' table.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    content: String,
    options: Json<Vec<AnswerOption>>,
    marks: i32,
}

/// Summary row with the question count computed by the query.
#[derive(FromRow)]
struct ExamSummaryRow {
    #[sqlx(flatten)]
    exam: ExamRow,
    question_count: i64,
}

/// Helper struct for reading the 'exam_sessions' table.
#[derive(FromRow)]
struct SessionRow {
    id: i64,
    student_id: i64,
    exam_id: i64,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    answers: Json<Vec<RecordedAnswer>>,
    score: Option<i64>,
    violation_count: i32,
    violation_logs: Json<Vec<ViolationLog>>,
    last_violation_at: Option<DateTime<Utc>>,
    version: i64,
}

impl TryFrom<SessionRow> for ExamSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(ExamSession {
            id: row.id,
            student_id: row.student_id,
            exam_id: row.exam_id,
            status: row
                .status
                .parse()
                .map_err(AppError::InternalServerError)?,
            start_time: row.start_time,
            end_time: row.end_time,
            answers: row.answers.0,
            score: row.score,
            violation_count: row.violation_count,
            violation_logs: row.violation_logs.0,
            last_violation_at: row.last_violation_at,
            version: row.version,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> Result<Vec<ExamSession>, AppError> {
    rows.into_iter().map(ExamSession::try_from).collect()
}

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_questions(&self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, content, options, marks
            FROM questions
            WHERE exam_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load questions for exam {}: {:?}", exam_id, e);
            AppError::from(e)
        })?;

        Ok(rows
            .into_iter()
            .map(|q| Question {
                id: q.id,
                text: q.content,
                options: q.options.0,
                marks: q.marks,
            })
            .collect())
    }
}

#[async_trait]
impl ExamCatalog for PgStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {} FROM exams WHERE id = $1",
            EXAM_COLUMNS
        ))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let questions = self.load_questions(exam_id).await?;
                Ok(Some(row.into_exam(questions)?))
            }
            None => Ok(None),
        }
    }

    async fn is_enrolled(&self, class_id: i64, student_id: i64) -> Result<bool, AppError> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM class_students WHERE class_id = $1 AND student_id = $2)",
        )
        .bind(class_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(enrolled)
    }

    async fn class_roster(&self, class_id: i64) -> Result<Vec<i64>, AppError> {
        let roster: Vec<i64> = sqlx::query_scalar(
            "SELECT student_id FROM class_students WHERE class_id = $1 ORDER BY student_id",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roster)
    }

    async fn list_open_exams(
        &self,
        student_id: i64,
        limit: i64,
    ) -> Result<Vec<ExamSummary>, AppError> {
        let rows = sqlx::query_as::<_, ExamSummaryRow>(
            r#"
            SELECT
                e.id, e.title, e.description, e.duration_minutes, e.total_marks,
                e.scheduled_start, e.scheduled_end, e.is_active, e.access_type,
                e.class_id, e.created_by,
                (SELECT COUNT(*) FROM questions q WHERE q.exam_id = e.id) AS question_count
            FROM exams e
            WHERE e.is_active = TRUE
              AND (
                e.access_type = 'public'
                OR (e.access_type = 'private' AND e.class_id IN (
                    SELECT class_id FROM class_students WHERE student_id = $1
                ))
              )
            ORDER BY e.scheduled_start DESC
            LIMIT $2
            "#,
        )
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list open exams: {:?}", e);
            AppError::from(e)
        })?;

        rows.into_iter()
            .map(|row| {
                let count = usize::try_from(row.question_count).unwrap_or(0);
                let mut summary = row.exam.into_exam(Vec::new())?.summary();
                summary.question_count = count;
                Ok(summary)
            })
            .collect()
    }

    async fn extend_exam(
        &self,
        exam_id: i64,
        extra_minutes: i32,
    ) -> Result<Option<Exam>, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE exams
            SET duration_minutes = duration_minutes + $2,
                scheduled_end = scheduled_end + make_interval(mins => $2)
            WHERE id = $1
            "#,
        )
        .bind(exam_id)
        .bind(extra_minutes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_exam(exam_id).await
    }

    async fn set_exam_active(&self, exam_id: i64, active: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE exams SET is_active = $2 WHERE id = $1 AND is_active <> $2",
        )
        .bind(exam_id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn find_session(&self, session_id: i64) -> Result<Option<ExamSession>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ExamSession::try_from).transpose()
    }

    async fn find_sessions(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Vec<ExamSession>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE student_id = $1 AND exam_id = $2",
            SESSION_COLUMNS
        ))
        .bind(student_id)
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        into_sessions(rows)
    }

    async fn sessions_for_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE exam_id = $1 ORDER BY id",
            SESSION_COLUMNS
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        into_sessions(rows)
    }

    async fn sessions_for_student(&self, student_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE student_id = $1 ORDER BY id",
            SESSION_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        into_sessions(rows)
    }

    async fn create_or_get(
        &self,
        student_id: i64,
        exam_id: i64,
        start_time: DateTime<Utc>,
    ) -> Result<(ExamSession, bool), AppError> {
        // The unique (student_id, exam_id) constraint makes racing starts converge.
        let inserted = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            INSERT INTO exam_sessions (student_id, exam_id, status, start_time)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (student_id, exam_id) DO NOTHING
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(student_id)
        .bind(exam_id)
        .bind(SessionStatus::InProgress.as_str())
        .bind(start_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create exam session: {:?}", e);
            AppError::from(e)
        })?;

        if let Some(row) = inserted {
            return Ok((ExamSession::try_from(row)?, true));
        }

        let existing = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE student_id = $1 AND exam_id = $2",
            SESSION_COLUMNS
        ))
        .bind(student_id)
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((ExamSession::try_from(existing)?, false))
    }

    async fn compare_and_set(
        &self,
        session: &ExamSession,
        expected_version: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE exam_sessions SET
                status = $3,
                end_time = $4,
                answers = $5,
                score = $6,
                violation_count = $7,
                violation_logs = $8,
                last_violation_at = $9,
                version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'in-progress'
            "#,
        )
        .bind(session.id)
        .bind(expected_version)
        .bind(session.status.as_str())
        .bind(session.end_time)
        .bind(Json(&session.answers))
        .bind(session.score)
        .bind(session.violation_count)
        .bind(Json(&session.violation_logs))
        .bind(session.last_violation_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to write exam session {}: {:?}", session.id, e);
            AppError::from(e)
        })?;

        Ok(result.rows_affected() == 1)
    }
}

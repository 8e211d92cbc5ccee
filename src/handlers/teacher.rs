// src/handlers/teacher.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Duration;
use serde_json::json;
use validator::Validate;

use crate::{
    engine::ExamEngine,
    error::AppError,
    models::exam::{Exam, ExtendExamRequest},
    utils::{
        json::AppJson,
        jwt::Claims,
        notify::{Notifier, dispatch_exam_published},
    },
};

/// Publish state is frozen this close to the scheduled start.
const PUBLISH_LOCK_MINUTES: i64 = 1;

/// Loads an exam the caller created. Admins may act on any exam.
/// Other teachers get 404 so exam ids do not leak.
async fn owned_exam(engine: &ExamEngine, claims: &Claims, exam_id: i64) -> Result<Exam, AppError> {
    let teacher_id = claims.user_id()?;
    let exam = engine
        .catalog()
        .find_exam(exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    if exam.created_by != teacher_id && !claims.is_admin() {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }
    Ok(exam)
}

/// Results dashboard for one exam.
pub async fn get_exam_results(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&engine, &claims, exam_id).await?;
    let rows = engine.exam_results(&exam).await?;
    Ok(Json(rows))
}

/// Adds minutes to an exam's duration and scheduled end.
///
/// Running sessions see the new allowed end on their next resync.
pub async fn extend_exam_time(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    AppJson(payload): AppJson<ExtendExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    owned_exam(&engine, &claims, exam_id).await?;

    let exam = engine
        .catalog()
        .extend_exam(exam_id, payload.extra_minutes)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    tracing::info!(
        "Exam {} extended by {} minutes (new end {})",
        exam_id,
        payload.extra_minutes,
        exam.scheduled_end
    );

    Ok(Json(json!({
        "message": format!("Exam time extended by {} minutes", payload.extra_minutes),
        "duration_minutes": exam.duration_minutes,
        "scheduled_end": exam.scheduled_end,
    })))
}

/// Toggles an exam between draft and published.
///
/// * Rejected for exams without questions.
/// * Rejected within one minute of the scheduled start (either direction).
/// * Publishing requires question marks to add up to the exam's total marks.
/// * Publishing a class-linked exam notifies the class in the background.
pub async fn toggle_publish_exam(
    State(engine): State<Arc<ExamEngine>>,
    State(notifier): State<Arc<dyn Notifier>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&engine, &claims, exam_id).await?;

    if exam.questions.is_empty() {
        return Err(AppError::BadRequest(
            "Cannot publish exam with 0 questions".to_string(),
        ));
    }

    if exam.scheduled_start - engine.now() < Duration::minutes(PUBLISH_LOCK_MINUTES) {
        return Err(AppError::InvalidState(
            "Cannot change exam status less than 1 minute before start time".to_string(),
        ));
    }

    let publishing = !exam.is_active;
    if publishing {
        let marks = exam.question_marks_total();
        if marks != i64::from(exam.total_marks) {
            return Err(AppError::BadRequest(format!(
                "Cannot publish: Total Question Marks ({}) do not match Exam Total Marks ({})",
                marks, exam.total_marks
            )));
        }
    }

    // Two toggles racing on the same state: only the first one flips it.
    if !engine.catalog().set_exam_active(exam_id, publishing).await? {
        return Err(AppError::Conflict(
            "Exam status was changed by another request, please reload".to_string(),
        ));
    }

    let mut notified = 0;
    if publishing {
        if let Some(class_id) = exam.class_id {
            // Roster lookup failure must not undo the publish.
            match engine.catalog().class_roster(class_id).await {
                Ok(roster) => {
                    notified = roster.len();
                    dispatch_exam_published(notifier, &exam, roster);
                }
                Err(e) => tracing::warn!("Failed to load roster for class {}: {}", class_id, e),
            }
        }
    }

    let mut message = format!(
        "Exam {}",
        if publishing { "published" } else { "unpublished" }
    );
    if notified > 0 {
        message.push_str(&format!(". Notification sent to {} students.", notified));
    }

    Ok(Json(json!({
        "message": message,
        "is_active": publishing,
    })))
}

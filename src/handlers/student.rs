// src/handlers/student.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::ExamEngine,
    error::AppError,
    models::session::{SubmitSessionRequest, ViolationRequest},
    utils::{json::AppJson, jwt::Claims},
};

/// Lists active exams the student may take (public, or private and enrolled),
/// each annotated with the student's attempt status.
pub async fn list_available_exams(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let exams = engine.available_exams(student_id).await?;
    Ok(Json(exams))
}

/// Starts an exam attempt.
///
/// * 201 Created with the session and the sanitized exam on first start.
/// * 200 OK with the same session when an in-progress attempt is resumed.
pub async fn start_exam(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let started = engine.start_session(student_id, exam_id).await?;

    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started)))
}

/// Submits the session's answers and freezes the score.
pub async fn submit_exam(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    AppJson(req): AppJson<SubmitSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let student_id = claims.user_id()?;
    let outcome = engine
        .submit_session(student_id, session_id, &req.answers)
        .await?;

    Ok(Json(outcome))
}

/// Logs an integrity violation; the third accepted one auto-submits.
pub async fn log_violation(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    AppJson(req): AppJson<ViolationRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let student_id = claims.user_id()?;
    let report = engine
        .report_violation(student_id, session_id, req.violation_type, &req.answers)
        .await?;

    Ok(Json(report))
}

/// Remaining time for a session, recomputed from server timestamps.
pub async fn session_time(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let time = engine.session_time(student_id, session_id).await?;
    Ok(Json(time))
}

/// The student's result for an exam, once the exam window has closed.
pub async fn get_my_exam_result(
    State(engine): State<Arc<ExamEngine>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let result = engine.get_result(student_id, exam_id).await?;
    Ok(Json(result))
}

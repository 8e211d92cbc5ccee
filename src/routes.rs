// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{student, teacher},
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Merges the student and teacher sub-routers.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (engine, notifier, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let student_routes = Router::new()
        .route("/exams", get(student::list_available_exams))
        .route("/exams/{id}/start", post(student::start_exam))
        .route("/exams/{id}/result", get(student::get_my_exam_result))
        .route("/sessions/{id}/time", get(student::session_time))
        .route("/sessions/{id}/submit", post(student::submit_exam))
        .route("/sessions/{id}/violation", post(student::log_violation))
        // Auth first, then role check
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let teacher_routes = Router::new()
        .route("/exams/{id}/results", get(teacher::get_exam_results))
        .route("/exams/{id}/extend", patch(teacher::extend_exam_time))
        .route("/exams/{id}/publish", patch(teacher::toggle_publish_exam))
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/student", student_routes)
        .nest("/api/teacher", teacher_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

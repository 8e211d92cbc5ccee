// tests/pg_store_tests.rs
//
// Runs against a real Postgres when DATABASE_URL is set; otherwise each
// test returns early.

use chrono::{Duration, Utc};
use exam_portal::{
    models::session::{RecordedAnswer, SessionStatus, ViolationLog, ViolationType},
    store::{ExamCatalog, PgStore, SessionRepository},
};
use sqlx::{PgPool, postgres::PgPoolOptions};

async fn connect() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to Postgres");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

/// Inserts a fresh draft exam so every test works on its own rows.
async fn insert_exam(pool: &PgPool) -> i64 {
    let now = Utc::now();
    sqlx::query_scalar(
        r#"
        INSERT INTO exams (title, duration_minutes, total_marks, scheduled_start, scheduled_end, created_by)
        VALUES ('Store test', 10, 10, $1, $2, 1)
        RETURNING id
        "#,
    )
    .bind(now)
    .bind(now + Duration::minutes(30))
    .fetch_one(pool)
    .await
    .expect("Failed to insert exam")
}

#[tokio::test]
async fn racing_creates_converge_on_one_row() {
    let Some(pool) = connect().await else { return };
    let exam_id = insert_exam(&pool).await;
    let store = PgStore::new(pool.clone());
    let now = Utc::now();

    let (a, b) = tokio::join!(
        store.create_or_get(501, exam_id, now),
        store.create_or_get(501, exam_id, now + Duration::seconds(1)),
    );
    let (a, a_created) = a.unwrap();
    let (b, b_created) = b.unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(a.start_time, b.start_time);
    assert!(a_created ^ b_created);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM exam_sessions WHERE student_id = 501 AND exam_id = $1",
    )
    .bind(exam_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn compare_and_set_guards_version_and_terminal_rows() {
    let Some(pool) = connect().await else { return };
    let exam_id = insert_exam(&pool).await;
    let store = PgStore::new(pool);
    let start = Utc::now();

    let (session, _) = store.create_or_get(502, exam_id, start).await.unwrap();
    assert_eq!(session.version, 0);

    // Accepted warning bumps the version.
    let mut warned = session.clone();
    warned.violation_count = 1;
    warned.violation_logs.push(ViolationLog {
        violation_type: ViolationType::TabSwitch,
        timestamp: start,
    });
    warned.last_violation_at = Some(start);
    assert!(store.compare_and_set(&warned, 0).await.unwrap());

    // A writer still holding version 0 loses.
    let mut stale = session.clone();
    stale.violation_count = 7;
    assert!(!store.compare_and_set(&stale, 0).await.unwrap());
    let current = store.find_session(session.id).await.unwrap().unwrap();
    assert_eq!(current.violation_count, 1);
    assert_eq!(current.version, 1);
    assert_eq!(current.violation_logs.len(), 1);

    // Finalize.
    let mut submitted = current.clone();
    submitted.status = SessionStatus::Submitted;
    submitted.end_time = Some(start + Duration::minutes(4));
    submitted.answers = vec![RecordedAnswer {
        question_id: 1,
        selected_option_id: 11,
    }];
    submitted.score = Some(5);
    assert!(store.compare_and_set(&submitted, 1).await.unwrap());
    let frozen = store.find_session(session.id).await.unwrap().unwrap();
    assert_eq!(frozen.version, 2);

    // Even with the right version, a terminal row is never rewritten.
    let mut late = frozen.clone();
    late.status = SessionStatus::Terminated;
    late.end_time = Some(start + Duration::minutes(9));
    late.score = Some(0);
    late.answers.clear();
    assert!(!store.compare_and_set(&late, 2).await.unwrap());

    let after = store.find_session(session.id).await.unwrap().unwrap();
    assert_eq!(after.status, SessionStatus::Submitted);
    assert_eq!(after.score, Some(5));
    assert_eq!(after.end_time, frozen.end_time);
    assert_eq!(after.answers, frozen.answers);
    assert_eq!(after.version, 2);
}

#[tokio::test]
async fn publish_flag_flips_only_from_the_opposite_state() {
    let Some(pool) = connect().await else { return };
    let exam_id = insert_exam(&pool).await;
    let store = PgStore::new(pool);

    assert!(store.set_exam_active(exam_id, true).await.unwrap());
    assert!(!store.set_exam_active(exam_id, true).await.unwrap());
    assert!(store.find_exam(exam_id).await.unwrap().unwrap().is_active);

    assert!(store.set_exam_active(exam_id, false).await.unwrap());
    assert!(!store.set_exam_active(-1, true).await.unwrap());
}

#[tokio::test]
async fn extension_moves_duration_and_end_together() {
    let Some(pool) = connect().await else { return };
    let exam_id = insert_exam(&pool).await;
    let store = PgStore::new(pool);

    let before = store.find_exam(exam_id).await.unwrap().unwrap();
    let after = store.extend_exam(exam_id, 20).await.unwrap().unwrap();

    assert_eq!(after.duration_minutes, before.duration_minutes + 20);
    assert_eq!(after.scheduled_end, before.scheduled_end + Duration::minutes(20));
    assert!(store.extend_exam(-1, 5).await.unwrap().is_none());
}

// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use exam_portal::config::Config;
use exam_portal::engine::clock::SystemClock;
use exam_portal::routes;
use exam_portal::state::AppState;
use exam_portal::store::{ExamCatalog, MemoryStore, PgStore, SessionRepository};
use exam_portal::utils::notify::LogNotifier;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let (exams, sessions): (Arc<dyn ExamCatalog>, Arc<dyn SessionRepository>) =
        match &config.database_url {
            Some(url) => {
                let store = Arc::new(PgStore::new(connect_with_retry(url).await?));
                (store.clone() as Arc<dyn ExamCatalog>, store as Arc<dyn SessionRepository>)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using the in-memory store (data is not persisted)");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn ExamCatalog>, store as Arc<dyn SessionRepository>)
            }
        };

    let state = AppState::new(
        config.clone(),
        exams,
        sessions,
        Arc::new(SystemClock),
        Arc::new(LogNotifier),
    );

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects to Postgres (retrying while the database boots) and applies migrations.
async fn connect_with_retry(database_url: &str) -> Result<PgPool, Box<dyn std::error::Error>> {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e.into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    Ok(pool)
}

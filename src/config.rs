// src/config.rs

use std::env;
use std::str::FromStr;
use dotenvy::dotenv;

/// Accepted violations tolerated before the next one terminates a session.
pub const DEFAULT_MAX_TOLERATED_VIOLATIONS: i32 = 2;

/// Minimum gap between two violation reports for both to count.
pub const DEFAULT_VIOLATION_DEBOUNCE_MS: i64 = 1000;

/// Cap on the student exam listing.
pub const AVAILABLE_EXAMS_LIMIT: i64 = 9;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. `None` runs the service on the in-process store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub max_tolerated_violations: i32,
    pub violation_debounce_ms: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            rust_log,
            port: parse_or("PORT", 3000),
            max_tolerated_violations: parse_or(
                "MAX_TOLERATED_VIOLATIONS",
                DEFAULT_MAX_TOLERATED_VIOLATIONS,
            ),
            violation_debounce_ms: parse_or("VIOLATION_DEBOUNCE_MS", DEFAULT_VIOLATION_DEBOUNCE_MS),
        }
    }

    /// Configuration with default policy values and the given secret.
    /// Handy for tests and tooling that do not read the environment.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.into(),
            rust_log: "error".to_string(),
            port: 0,
            max_tolerated_violations: DEFAULT_MAX_TOLERATED_VIOLATIONS,
            violation_debounce_ms: DEFAULT_VIOLATION_DEBOUNCE_MS,
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

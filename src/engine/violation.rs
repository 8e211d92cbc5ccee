// src/engine/violation.rs

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::{Config, DEFAULT_MAX_TOLERATED_VIOLATIONS, DEFAULT_VIOLATION_DEBOUNCE_MS},
    models::session::ExamSession,
};

/// Debounce and threshold rules for integrity reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationPolicy {
    /// Reports closer than this to the last accepted one are dropped.
    pub debounce: Duration,
    /// Accepted violations tolerated as warnings. The next one terminates.
    pub max_tolerated: i32,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::milliseconds(DEFAULT_VIOLATION_DEBOUNCE_MS),
            max_tolerated: DEFAULT_MAX_TOLERATED_VIOLATIONS,
        }
    }
}

impl From<&Config> for ViolationPolicy {
    fn from(config: &Config) -> Self {
        Self {
            debounce: Duration::milliseconds(config.violation_debounce_ms.max(0)),
            max_tolerated: config.max_tolerated_violations.max(0),
        }
    }
}

/// What a single report does to an in-progress session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Inside the debounce window; nothing is recorded.
    Debounced,
    /// Logged as a warning; carries the new count.
    Warning(i32),
    /// Logged and crosses the threshold; carries the new count.
    Terminate(i32),
}

impl ViolationPolicy {
    /// Decides the outcome of a report against the persisted session state.
    /// The caller has already checked the session is in progress.
    pub fn evaluate(&self, session: &ExamSession, now: DateTime<Utc>) -> ViolationOutcome {
        if let Some(last) = session.last_violation_at {
            if now - last < self.debounce {
                return ViolationOutcome::Debounced;
            }
        }

        let count = session.violation_count + 1;
        if count > self.max_tolerated {
            ViolationOutcome::Terminate(count)
        } else {
            ViolationOutcome::Warning(count)
        }
    }
}

// src/engine/clock.rs

//! Server-side time reconciliation.
//!
//! Remaining time is always derived from persisted timestamps and the
//! server clock. Nothing the client says about elapsed time is consulted.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::models::{exam::Exam, session::TimeSnapshot};

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the hosting process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `min(start + duration, scheduled_end)`.
pub fn allowed_end(
    start_time: DateTime<Utc>,
    duration_minutes: i32,
    scheduled_end: DateTime<Utc>,
) -> DateTime<Utc> {
    let by_duration = start_time + Duration::minutes(i64::from(duration_minutes));
    by_duration.min(scheduled_end)
}

/// `max(0, allowed_end - now)`.
pub fn remaining(allowed_end: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (allowed_end - now).max(Duration::zero())
}

/// Recomputes the time view of a session against the exam as it is stored
/// right now, so extensions and schedule edits are reflected immediately.
pub fn reconcile(start_time: DateTime<Utc>, exam: &Exam, now: DateTime<Utc>) -> TimeSnapshot {
    let allowed_end = allowed_end(start_time, exam.duration_minutes, exam.scheduled_end);
    let left = remaining(allowed_end, now);

    TimeSnapshot {
        server_now: now,
        allowed_end,
        remaining_seconds: whole_seconds_up(left),
        expired: left.is_zero(),
    }
}

/// Rounds up, so a fraction of a second left still reads as time left.
fn whole_seconds_up(left: Duration) -> i64 {
    let secs = left.num_seconds();
    if left > Duration::seconds(secs) {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::AccessType;

    fn exam(start: DateTime<Utc>, duration_minutes: i32, end: DateTime<Utc>) -> Exam {
        Exam {
            id: 1,
            title: "Timed".into(),
            description: None,
            duration_minutes,
            total_marks: 0,
            scheduled_start: start,
            scheduled_end: end,
            is_active: true,
            access_type: AccessType::Public,
            class_id: None,
            created_by: 1,
            questions: vec![],
        }
    }

    #[test]
    fn duration_bounds_the_attempt() {
        let t = Utc::now();
        let e = exam(t, 10, t + Duration::minutes(30));
        let snap = reconcile(t, &e, t + Duration::minutes(5));
        assert_eq!(snap.allowed_end, t + Duration::minutes(10));
        assert_eq!(snap.remaining_seconds, 5 * 60);
        assert!(!snap.expired);
    }

    #[test]
    fn scheduled_end_bounds_a_late_start() {
        let t = Utc::now();
        let e = exam(t, 60, t + Duration::minutes(30));
        let late_start = t + Duration::minutes(25);
        let snap = reconcile(late_start, &e, late_start);
        assert_eq!(snap.allowed_end, t + Duration::minutes(30));
        assert_eq!(snap.remaining_seconds, 5 * 60);
    }

    #[test]
    fn extension_is_picked_up_on_next_reconcile() {
        let t = Utc::now();
        let mut e = exam(t, 10, t + Duration::minutes(30));
        e.duration_minutes += 20;
        e.scheduled_end += Duration::minutes(20);
        let snap = reconcile(t, &e, t + Duration::minutes(12));
        assert_eq!(snap.remaining_seconds, 18 * 60);
    }

    #[test]
    fn shrunk_schedule_clamps_to_zero() {
        let t = Utc::now();
        let mut e = exam(t, 60, t + Duration::minutes(60));
        e.scheduled_end = t + Duration::minutes(5);
        let snap = reconcile(t, &e, t + Duration::minutes(7));
        assert_eq!(snap.remaining_seconds, 0);
        assert!(snap.expired);
    }

    #[test]
    fn sub_second_remainder_is_not_reported_as_zero() {
        let t = Utc::now();
        let e = exam(t, 10, t + Duration::minutes(30));
        let almost = t + Duration::minutes(10) - Duration::milliseconds(500);
        let snap = reconcile(t, &e, almost);
        assert_eq!(snap.remaining_seconds, 1);
        assert!(!snap.expired);

        let at_end = reconcile(t, &e, t + Duration::minutes(10));
        assert_eq!(at_end.remaining_seconds, 0);
        assert!(at_end.expired);
    }

    #[test]
    fn manual_clock_moves_only_on_request() {
        let t = Utc::now();
        let clock = ManualClock::new(t);
        assert_eq!(clock.now(), t);
        clock.advance(Duration::seconds(3));
        assert_eq!(clock.now(), t + Duration::seconds(3));
    }
}

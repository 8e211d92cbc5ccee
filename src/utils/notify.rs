// src/utils/notify.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::AppError, models::exam::Exam};

/// A message for one student.
#[derive(Debug, Clone)]
pub struct Notification {
    pub student_id: i64,
    pub subject: String,
    pub body: String,
}

/// Outbound notification channel (email or otherwise).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), AppError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), AppError> {
        tracing::info!(
            student_id = notification.student_id,
            subject = %notification.subject,
            "Notification queued"
        );
        Ok(())
    }
}

fn exam_published_body(exam: &Exam) -> String {
    format!(
        "A new exam has been scheduled: {}\n\
         Date: {}\n\
         Time: {} UTC\n\
         Duration: {} minutes\n\
         Questions: {}\n\
         Total marks: {}\n\
         Please log in to the portal on time to take the exam.",
        exam.title,
        exam.scheduled_start.format("%A, %B %-d, %Y"),
        exam.scheduled_start.format("%H:%M"),
        exam.duration_minutes,
        exam.questions.len(),
        exam.total_marks,
    )
}

/// Tells every student in `roster` about a newly published exam.
///
/// Runs on a detached task: the caller returns immediately and delivery
/// failures are only logged.
pub fn dispatch_exam_published(notifier: Arc<dyn Notifier>, exam: &Exam, roster: Vec<i64>) {
    if roster.is_empty() {
        return;
    }

    let subject = format!("Exam Scheduled: {}", exam.title);
    let body = exam_published_body(exam);
    let exam_id = exam.id;

    tokio::spawn(async move {
        tracing::info!(
            "[Exam Publish] Sending notifications for exam {} to {} students",
            exam_id,
            roster.len()
        );
        for student_id in roster {
            let notification = Notification {
                student_id,
                subject: subject.clone(),
                body: body.clone(),
            };
            if let Err(e) = notifier.send(notification).await {
                tracing::warn!("Failed to notify student {}: {}", student_id, e);
            }
        }
    });
}

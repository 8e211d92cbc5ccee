// src/engine/scoring.rs

use std::collections::HashMap;

use crate::models::{
    exam::Exam,
    session::{AnswerSubmission, RecordedAnswer},
};

/// Result of grading one answer payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub score: i64,
    pub correct_count: usize,
    /// The answers that will be stored with the session.
    pub recorded: Vec<RecordedAnswer>,
}

/// Grades `answers` against the exam's answer key.
///
/// * Blank answers and answers to questions outside the exam are dropped.
/// * A question answered twice keeps its last answer.
/// * Correct option: full marks. Anything else: zero. No negative marking.
pub fn score(exam: &Exam, answers: &[AnswerSubmission]) -> ScoreCard {
    let mut recorded: Vec<RecordedAnswer> = Vec::new();
    let mut position: HashMap<i64, usize> = HashMap::new();

    for answer in answers {
        let Some(option_id) = answer.selected_option_id else {
            continue;
        };
        if exam.question(answer.question_id).is_none() {
            continue;
        }

        let entry = RecordedAnswer {
            question_id: answer.question_id,
            selected_option_id: option_id,
        };
        match position.get(&answer.question_id) {
            Some(&idx) => recorded[idx] = entry,
            None => {
                position.insert(answer.question_id, recorded.len());
                recorded.push(entry);
            }
        }
    }

    let mut total = 0;
    let mut correct_count = 0;

    for answer in &recorded {
        let Some(question) = exam.question(answer.question_id) else {
            continue;
        };
        if question
            .option(answer.selected_option_id)
            .is_some_and(|o| o.is_correct)
        {
            total += i64::from(question.marks);
            correct_count += 1;
        }
    }

    ScoreCard {
        score: total,
        correct_count,
        recorded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::{AccessType, AnswerOption, Question};
    use chrono::{Duration, Utc};

    /// Two questions, five marks each. Q1: option 11 correct. Q2: option 22 correct.
    fn exam() -> Exam {
        let now = Utc::now();
        let q = |id: i64, correct: i64| Question {
            id,
            text: format!("Question {}", id),
            options: (1..=3)
                .map(|n| {
                    let option_id = id * 10 + n;
                    AnswerOption {
                        id: option_id,
                        text: format!("Option {}", n),
                        is_correct: option_id == correct,
                    }
                })
                .collect(),
            marks: 5,
        };
        Exam {
            id: 7,
            title: "Two".into(),
            description: None,
            duration_minutes: 10,
            total_marks: 10,
            scheduled_start: now,
            scheduled_end: now + Duration::hours(1),
            is_active: true,
            access_type: AccessType::Public,
            class_id: None,
            created_by: 1,
            questions: vec![q(1, 11), q(2, 22)],
        }
    }

    fn ans(question_id: i64, option: Option<i64>) -> AnswerSubmission {
        AnswerSubmission {
            question_id,
            selected_option_id: option,
        }
    }

    #[test]
    fn one_right_one_wrong() {
        let card = score(&exam(), &[ans(1, Some(11)), ans(2, Some(23))]);
        assert_eq!(card.score, 5);
        assert_eq!(card.correct_count, 1);
        assert_eq!(card.recorded.len(), 2);
    }

    #[test]
    fn empty_payload_scores_zero() {
        let card = score(&exam(), &[]);
        assert_eq!(card.score, 0);
        assert!(card.recorded.is_empty());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let card = score(&exam(), &[ans(99, Some(1)), ans(1, Some(999)), ans(2, Some(22))]);
        assert_eq!(card.score, 5);
        // The unknown question is dropped, the unknown option is kept but earns nothing.
        assert_eq!(card.recorded.len(), 2);
    }

    #[test]
    fn blank_answers_are_not_recorded() {
        let card = score(&exam(), &[ans(1, None)]);
        assert_eq!(card.score, 0);
        assert!(card.recorded.is_empty());
    }

    #[test]
    fn repeated_question_keeps_last_answer() {
        let card = score(&exam(), &[ans(1, Some(11)), ans(1, Some(11)), ans(1, Some(12))]);
        assert_eq!(card.score, 0);
        assert_eq!(
            card.recorded,
            vec![RecordedAnswer { question_id: 1, selected_option_id: 12 }]
        );
    }

    #[test]
    fn scoring_is_deterministic() {
        let e = exam();
        let payload = [ans(2, Some(22)), ans(1, Some(11))];
        assert_eq!(score(&e, &payload), score(&e, &payload));
        assert_eq!(score(&e, &payload).score, 10);
    }
}

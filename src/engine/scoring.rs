// src/engine/scoring.rs

use serde::Serialize;

use crate::{
    models::{
        answer::{AnswerRecord, AnswerStatus},
        question::Question,
        result::NewTestResult,
        test::Test,
    },
    utils::jwt::Identity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    Unattempted,
}

/// Classifies one answer against its question. Only the selected key matters;
/// a review mark without a selection is unattempted.
pub fn classify(question: &Question, record: &AnswerRecord) -> Outcome {
    match record.selected_key {
        Some(key) if question.is_correct(key) => Outcome::Correct,
        Some(_) => Outcome::Incorrect,
        None => Outcome::Unattempted,
    }
}

/// `achieved / total * 100`, or 0 for a zero total. Not clamped.
pub fn percentage(achieved: f64, total: f64) -> f64 {
    if total > 0.0 {
        achieved * 100.0 / total
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unattempted_count: u32,
    pub achieved_marks: f64,
    pub total_marks: f64,
    pub percentage: f64,
    /// Answers with their final status.
    pub answers: Vec<AnswerRecord>,
}

/// Grades a final answer sheet. Missing trailing answers count as unattempted.
pub fn grade(test: &Test, answers: &[AnswerRecord]) -> Grade {
    let mut correct_count = 0u32;
    let mut incorrect_count = 0u32;
    let mut unattempted_count = 0u32;
    let mut finalized = Vec::with_capacity(test.question_count());

    for (i, question) in test.questions.iter().enumerate() {
        let record = answers.get(i).copied().unwrap_or_default();
        let status = match classify(question, &record) {
            Outcome::Correct => {
                correct_count += 1;
                AnswerStatus::Answered
            }
            Outcome::Incorrect => {
                incorrect_count += 1;
                AnswerStatus::Incorrect
            }
            Outcome::Unattempted => {
                unattempted_count += 1;
                AnswerStatus::Unattempted
            }
        };
        finalized.push(AnswerRecord {
            selected_key: record.selected_key,
            status,
        });
    }

    let achieved_marks = correct_count as f64 * test.marks_per_question
        - incorrect_count as f64 * test.negative_marking;
    let total_marks = test.total_marks();

    Grade {
        correct_count,
        incorrect_count,
        unattempted_count,
        achieved_marks,
        total_marks,
        percentage: percentage(achieved_marks, total_marks),
        answers: finalized,
    }
}

/// Grades the sheet and builds the record handed to the result store.
pub fn build_result(
    test: &Test,
    answers: &[AnswerRecord],
    identity: &Identity,
    seconds_remaining: u32,
) -> NewTestResult {
    let grade = grade(test, answers);
    let time_taken = test.duration_seconds().saturating_sub(seconds_remaining);

    NewTestResult {
        user_id: identity.user_id.clone(),
        user_name: identity.display_name.clone(),
        test_id: test.id.clone(),
        test_title: test.title.clone(),
        category_id: test.category_id.clone(),
        category_name: test.category_name.clone(),
        score: grade.achieved_marks,
        total: grade.total_marks,
        correct_count: grade.correct_count,
        incorrect_count: grade.incorrect_count,
        unattempted_count: grade.unattempted_count,
        percentage: grade.percentage,
        answers: grade.answers,
        time_taken_seconds: Some(time_taken),
    }
}

// src/models/test.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{Question, RawQuestion},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
}

impl PublishStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Published => "published",
        }
    }
}

fn default_marks_per_question() -> f64 {
    1.0
}

/// A test document as stored, before its questions are normalized.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RawTest {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub questions: Vec<RawQuestion>,
    #[validate(range(min = 1))]
    pub duration_minutes: u32,
    #[serde(default = "default_marks_per_question")]
    #[validate(range(exclusive_min = 0.0))]
    pub marks_per_question: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub negative_marking: f64,
    #[serde(default)]
    pub status: PublishStatus,
}

impl RawTest {
    /// Validates the document and normalizes every question.
    /// An empty question list is accepted here; it is rejected when a session starts.
    pub fn normalize(self) -> Result<Test, AppError> {
        self.validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid test '{}': {}", self.id, e)))?;

        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| {
                q.normalize().map_err(|e| {
                    AppError::BadRequest(format!("Test '{}', question {}: {}", self.id, i + 1, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Test {
            id: self.id,
            title: self.title,
            category_id: self.category_id,
            category_name: self.category_name,
            questions,
            duration_minutes: self.duration_minutes,
            marks_per_question: self.marks_per_question,
            negative_marking: self.negative_marking,
            status: self.status,
        })
    }
}

/// A test with normalized questions, ready for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub id: String,
    pub title: String,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub questions: Vec<Question>,
    pub duration_minutes: u32,
    pub marks_per_question: f64,
    pub negative_marking: f64,
    pub status: PublishStatus,
}

impl Test {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    pub fn total_marks(&self) -> f64 {
        self.question_count() as f64 * self.marks_per_question
    }

    pub fn ensure_has_questions(&self) -> Result<(), AppError> {
        if self.questions.is_empty() {
            return Err(AppError::NoQuestions);
        }
        Ok(())
    }
}

/// Catalog DTO. Never carries questions.
#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub id: String,
    pub title: String,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub question_count: usize,
    pub duration_minutes: u32,
    pub marks_per_question: f64,
    pub negative_marking: f64,
    pub total_marks: f64,
}

impl From<&Test> for TestSummary {
    fn from(test: &Test) -> Self {
        Self {
            id: test.id.clone(),
            title: test.title.clone(),
            category_id: test.category_id.clone(),
            category_name: test.category_name.clone(),
            question_count: test.question_count(),
            duration_minutes: test.duration_minutes,
            marks_per_question: test.marks_per_question,
            negative_marking: test.negative_marking,
            total_marks: test.total_marks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(extra: serde_json::Value) -> RawTest {
        let mut doc = serde_json::json!({
            "id": "ssc-cgl-1",
            "title": "SSC CGL Mock 1",
            "durationMinutes": 30,
            "questions": [
                {"question": "Q1", "options": ["a", "b", "c", "d"], "correctAnswer": "B"}
            ]
        });
        if let (Some(base), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let test = raw(serde_json::json!({})).normalize().unwrap();
        assert_eq!(test.marks_per_question, 1.0);
        assert_eq!(test.negative_marking, 0.0);
        assert_eq!(test.status, PublishStatus::Draft);
        assert_eq!(test.question_count(), 1);
        assert_eq!(test.duration_seconds(), 1800);
    }

    #[test]
    fn negative_marking_must_not_be_negative() {
        let result = raw(serde_json::json!({"negativeMarking": -0.5})).normalize();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn empty_test_loads_but_cannot_start() {
        let test = raw(serde_json::json!({"questions": []})).normalize().unwrap();
        assert!(matches!(test.ensure_has_questions(), Err(AppError::NoQuestions)));
    }

    #[test]
    fn bad_question_names_its_position() {
        let result = raw(serde_json::json!({
            "questions": [
                {"question": "Q1", "options": ["a", "b", "c", "d"], "correctAnswer": "A"},
                {"question": "Q2", "options": ["a", "b"], "correctAnswer": "A"}
            ]
        }))
        .normalize();

        match result {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("question 2")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

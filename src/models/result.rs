// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::answer::AnswerRecord;

/// Immutable outcome of a submitted session.
/// Created exactly once by the result store and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub user_id: String,
    /// Display name at submission time, shown on leaderboards.
    pub user_name: String,
    pub test_id: String,
    pub test_title: String,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    /// Achieved marks. Not clamped, can be negative with heavy negative marking.
    pub score: f64,
    pub total: f64,
    pub correct_count: u32,
    pub incorrect_count: u32,
    #[serde(default)]
    pub unattempted_count: u32,
    pub percentage: f64,
    pub submitted_at: DateTime<Utc>,
    /// Empty for records saved before answers were persisted.
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    pub time_taken_seconds: Option<u32>,
}

/// A result before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTestResult {
    pub user_id: String,
    pub user_name: String,
    pub test_id: String,
    pub test_title: String,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub score: f64,
    pub total: f64,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unattempted_count: u32,
    pub percentage: f64,
    pub answers: Vec<AnswerRecord>,
    pub time_taken_seconds: Option<u32>,
}

impl NewTestResult {
    pub fn into_result(self, id: Uuid, submitted_at: DateTime<Utc>) -> TestResult {
        TestResult {
            id,
            user_id: self.user_id,
            user_name: self.user_name,
            test_id: self.test_id,
            test_title: self.test_title,
            category_id: self.category_id,
            category_name: self.category_name,
            score: self.score,
            total: self.total,
            correct_count: self.correct_count,
            incorrect_count: self.incorrect_count,
            unattempted_count: self.unattempted_count,
            percentage: self.percentage,
            submitted_at,
            answers: self.answers,
            time_taken_seconds: self.time_taken_seconds,
        }
    }
}

/// One row of a leaderboard: the best result of a distinct user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub display_name: String,
    pub score_percent: f64,
    pub is_current_user: bool,
}

/// Derived statistics for one result against every result of the same test.
/// Recomputed on each view, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSnapshot {
    pub rank: usize,
    pub participant_count: usize,
    pub average_score_percent: f64,
    pub top_score_percent: f64,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Results screen payload. `comparison` is absent when the population could not be read;
/// the user's own score is always present.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsView {
    pub result: TestResult,
    pub comparison: Option<ComparisonSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_error: Option<String>,
}

// src/models/answer.rs

use serde::{Deserialize, Serialize};

use crate::models::question::OptionKey;

/// While a test is running `Answered` means "answered, correctness pending".
/// Scoring finalizes it: correct answers stay `Answered`, wrong ones become `Incorrect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerStatus {
    #[default]
    Unattempted,
    Answered,
    Incorrect,
    MarkedForReview,
}

/// One entry per question index, never sparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub selected_key: Option<OptionKey>,
    pub status: AnswerStatus,
}

impl AnswerRecord {
    pub fn unattempted() -> Self {
        Self::default()
    }

    pub fn answered(key: OptionKey) -> Self {
        Self {
            selected_key: Some(key),
            status: AnswerStatus::Answered,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.selected_key.is_some()
    }
}

// src/models/snapshot.rs

use serde::{Deserialize, Serialize};

use crate::models::{answer::AnswerRecord, question::Language};

/// Resumable state of an in-progress session, persisted as JSON in the
/// user's single snapshot slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub test_id: String,
    pub current_question_index: usize,
    pub answers: Vec<AnswerRecord>,
    pub seconds_remaining: u32,
    #[serde(default)]
    pub language: Language,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

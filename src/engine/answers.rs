// src/engine/answers.rs

use crate::{
    error::AppError,
    models::{
        answer::{AnswerRecord, AnswerStatus},
        question::OptionKey,
    },
};

/// Fixed-length answer sheet. Index `i` always belongs to question `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerStore {
    records: Vec<AnswerRecord>,
}

impl AnswerStore {
    /// All-unattempted sheet for `len` questions.
    pub fn new(len: usize) -> Self {
        Self {
            records: vec![AnswerRecord::unattempted(); len],
        }
    }

    /// Restores a saved sheet. Returns `None` when its length does not match.
    pub fn restore(records: Vec<AnswerRecord>, len: usize) -> Option<Self> {
        (records.len() == len).then_some(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AnswerRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&AnswerRecord> {
        self.records.get(index)
    }

    pub fn answered_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_answered()).count()
    }

    /// Records a selection. Correctness is not known until scoring.
    pub fn set_answer(&mut self, index: usize, key: OptionKey) -> Result<(), AppError> {
        let record = self.slot(index)?;
        record.selected_key = Some(key);
        if record.status != AnswerStatus::MarkedForReview {
            record.status = AnswerStatus::Answered;
        }
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> Result<(), AppError> {
        *self.slot(index)? = AnswerRecord::unattempted();
        Ok(())
    }

    /// Flips the marked-for-review flag, keeping any selection.
    pub fn toggle_marked(&mut self, index: usize) -> Result<(), AppError> {
        let record = self.slot(index)?;
        record.status = match (record.status, record.selected_key) {
            (AnswerStatus::MarkedForReview, Some(_)) => AnswerStatus::Answered,
            (AnswerStatus::MarkedForReview, None) => AnswerStatus::Unattempted,
            _ => AnswerStatus::MarkedForReview,
        };
        Ok(())
    }

    fn slot(&mut self, index: usize) -> Result<&mut AnswerRecord, AppError> {
        let len = self.records.len();
        self.records.get_mut(index).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Question index {} out of range (test has {} questions)",
                index, len
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear() {
        let mut store = AnswerStore::new(3);
        store.set_answer(1, OptionKey::C).unwrap();
        assert_eq!(store.get(1), Some(&AnswerRecord::answered(OptionKey::C)));
        assert_eq!(store.answered_count(), 1);

        store.clear(1).unwrap();
        assert_eq!(store.get(1), Some(&AnswerRecord::unattempted()));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut store = AnswerStore::new(2);
        assert!(matches!(store.set_answer(2, OptionKey::A), Err(AppError::BadRequest(_))));
        assert!(store.clear(5).is_err());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn marking_keeps_selection() {
        let mut store = AnswerStore::new(1);
        store.set_answer(0, OptionKey::B).unwrap();
        store.toggle_marked(0).unwrap();
        assert_eq!(store.get(0).unwrap().status, AnswerStatus::MarkedForReview);

        // changing the answer while marked keeps the mark
        store.set_answer(0, OptionKey::D).unwrap();
        assert_eq!(store.get(0).unwrap().status, AnswerStatus::MarkedForReview);
        assert_eq!(store.get(0).unwrap().selected_key, Some(OptionKey::D));

        store.toggle_marked(0).unwrap();
        assert_eq!(store.get(0).unwrap().status, AnswerStatus::Answered);
    }

    #[test]
    fn restore_rejects_length_mismatch() {
        assert!(AnswerStore::restore(vec![AnswerRecord::unattempted(); 2], 3).is_none());
        assert!(AnswerStore::restore(vec![AnswerRecord::unattempted(); 3], 3).is_some());
    }
}

// src/engine/review.rs

use serde::{Deserialize, Serialize};

use crate::{
    engine::scoring::{Outcome, classify},
    models::{answer::AnswerRecord, test::Test},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewFilter {
    #[default]
    All,
    Correct,
    Incorrect,
    Unattempted,
}

impl ReviewFilter {
    fn accepts(self, outcome: Outcome) -> bool {
        match self {
            ReviewFilter::All => true,
            ReviewFilter::Correct => outcome == Outcome::Correct,
            ReviewFilter::Incorrect => outcome == Outcome::Incorrect,
            ReviewFilter::Unattempted => outcome == Outcome::Unattempted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub correct: usize,
    pub incorrect: usize,
    pub unattempted: usize,
}

/// Cursor over the questions of a finished test, restricted to one outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionReview {
    outcomes: Vec<Outcome>,
    filter: ReviewFilter,
    matching: Vec<usize>,
    current: usize,
}

impl SolutionReview {
    pub fn new(test: &Test, answers: &[AnswerRecord]) -> Self {
        let outcomes: Vec<Outcome> = test
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| classify(q, &answers.get(i).copied().unwrap_or_default()))
            .collect();
        let matching = (0..outcomes.len()).collect();

        Self {
            outcomes,
            filter: ReviewFilter::All,
            matching,
            current: 0,
        }
    }

    pub fn filter(&self) -> ReviewFilter {
        self.filter
    }

    /// Question index under the cursor.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn outcome(&self, index: usize) -> Option<Outcome> {
        self.outcomes.get(index).copied()
    }

    /// Question indices that pass the active filter, ascending.
    pub fn matching(&self) -> &[usize] {
        &self.matching
    }

    pub fn counts(&self) -> OutcomeCounts {
        let count = |o: Outcome| self.outcomes.iter().filter(|x| **x == o).count();
        OutcomeCounts {
            correct: count(Outcome::Correct),
            incorrect: count(Outcome::Incorrect),
            unattempted: count(Outcome::Unattempted),
        }
    }

    /// Switches filter. The cursor stays put if it still matches, otherwise it
    /// jumps to the first match; an empty filter leaves it unchanged.
    pub fn set_filter(&mut self, filter: ReviewFilter) {
        self.filter = filter;
        self.matching = self
            .outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| filter.accepts(**o))
            .map(|(i, _)| i)
            .collect();

        if !self.matching.contains(&self.current) {
            if let Some(first) = self.matching.first() {
                self.current = *first;
            }
        }
    }

    /// Moves to the next matching index. No-op at the end.
    pub fn next(&mut self) -> usize {
        if let Some(next) = self.matching.iter().find(|i| **i > self.current) {
            self.current = *next;
        }
        self.current
    }

    /// Moves to the previous matching index. No-op at the start.
    pub fn previous(&mut self) -> usize {
        if let Some(prev) = self.matching.iter().rev().find(|i| **i < self.current) {
            self.current = *prev;
        }
        self.current
    }

    /// Jumps to an index if it passes the filter.
    pub fn go_to(&mut self, index: usize) -> bool {
        if self.matching.contains(&index) {
            self.current = index;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scoring::tests::test_with;
    use crate::models::question::OptionKey;

    /// Questions 1, 4 and 7 answered wrong; 0, 3, 6 right; the rest skipped.
    fn review() -> SolutionReview {
        let test = test_with(&[OptionKey::A; 9], 10, 1.0, 0.0);
        let answers: Vec<AnswerRecord> = (0..9)
            .map(|i| match i % 3 {
                0 => AnswerRecord::answered(OptionKey::A),
                1 => AnswerRecord::answered(OptionKey::B),
                _ => AnswerRecord::unattempted(),
            })
            .collect();
        SolutionReview::new(&test, &answers)
    }

    #[test]
    fn counts_and_matching() {
        let mut r = review();
        assert_eq!(
            r.counts(),
            OutcomeCounts {
                correct: 3,
                incorrect: 3,
                unattempted: 3
            }
        );
        r.set_filter(ReviewFilter::Incorrect);
        assert_eq!(r.matching(), &[1, 4, 7]);
        assert_eq!(r.current(), 1);
    }

    #[test]
    fn navigation_is_bounded_within_filter() {
        let mut r = review();
        r.set_filter(ReviewFilter::Incorrect);

        assert_eq!(r.previous(), 1);
        assert_eq!(r.next(), 4);
        assert_eq!(r.next(), 7);
        assert_eq!(r.next(), 7);
        assert_eq!(r.previous(), 4);
    }

    #[test]
    fn filter_keeps_matching_position() {
        let mut r = review();
        assert!(r.go_to(4));
        r.set_filter(ReviewFilter::Incorrect);
        assert_eq!(r.current(), 4);

        r.set_filter(ReviewFilter::Unattempted);
        assert_eq!(r.current(), 2);

        r.set_filter(ReviewFilter::All);
        assert_eq!(r.current(), 2);
    }

    #[test]
    fn empty_filter_leaves_cursor() {
        let test = test_with(&[OptionKey::A; 3], 10, 1.0, 0.0);
        let answers = vec![AnswerRecord::answered(OptionKey::A); 3];
        let mut r = SolutionReview::new(&test, &answers);
        r.go_to(2);

        r.set_filter(ReviewFilter::Incorrect);
        assert!(r.matching().is_empty());
        assert_eq!(r.current(), 2);
        assert_eq!(r.next(), 2);
        assert!(!r.go_to(0));
    }
}

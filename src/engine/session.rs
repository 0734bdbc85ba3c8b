// src/engine/session.rs

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    engine::{
        answers::AnswerStore,
        review::{OutcomeCounts, ReviewFilter, SolutionReview},
        scoring::{Outcome, build_result},
        snapshot::ResumeSlot,
        timer::{Countdown, TickOutcome},
    },
    error::AppError,
    models::{
        answer::AnswerRecord,
        question::{Language, OptionKey, QuestionView},
        result::{NewTestResult, TestResult},
        snapshot::SessionSnapshot,
        test::Test,
    },
    store::SnapshotStore,
    utils::jwt::Identity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    Loading,
    TakingTest,
    Results,
    SolutionReview,
}

/// How a session is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionAction {
    #[default]
    Start,
    Resume,
    ShowResult,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub action: SessionAction,
    pub language: Language,
    /// Required for `ShowResult`.
    pub prior_result: Option<TestResult>,
    /// Anonymous sessions have no resume slot until someone submits them.
    pub owner: Option<Identity>,
}

/// One user's attempt at one test.
///
/// All mutation goes through `&mut self`; the runtime owns each session on a
/// single task, so nothing here locks.
pub struct TestSession {
    test: Arc<Test>,
    phase: SessionPhase,
    answers: AnswerStore,
    clock: Countdown,
    current_index: usize,
    language: Language,
    owner: Option<Identity>,
    snapshots: Arc<dyn SnapshotStore>,
    submitting: bool,
    result: Option<TestResult>,
    review: Option<SolutionReview>,
}

impl TestSession {
    pub fn open(
        test: Arc<Test>,
        options: SessionOptions,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Result<Self, AppError> {
        test.ensure_has_questions()?;

        let len = test.question_count();
        let mut session = Self {
            answers: AnswerStore::new(len),
            clock: Countdown::new(test.duration_seconds()),
            test,
            phase: SessionPhase::Loading,
            current_index: 0,
            language: options.language,
            owner: options.owner,
            snapshots,
            submitting: false,
            result: None,
            review: None,
        };

        match options.action {
            SessionAction::Start => session.start_fresh(),
            SessionAction::Resume => {
                if !session.restore() {
                    session.start_fresh();
                }
            }
            SessionAction::ShowResult => {
                let result = options.prior_result.ok_or_else(|| {
                    AppError::BadRequest("A prior result is required to show results".to_string())
                })?;
                if result.test_id != session.test.id {
                    return Err(AppError::BadRequest(format!(
                        "Result {} does not belong to test {}",
                        result.id, session.test.id
                    )));
                }
                session.show_result(result);
            }
        }

        Ok(session)
    }

    pub fn test(&self) -> &Test {
        &self.test
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.clock.remaining()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        self.answers.records()
    }

    pub fn owner(&self) -> Option<&Identity> {
        self.owner.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// True while the test is being taken and time is left.
    pub fn is_clock_running(&self) -> bool {
        self.phase == SessionPhase::TakingTest && !self.clock.is_expired()
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    pub fn review(&self) -> Option<&SolutionReview> {
        self.review.as_ref()
    }

    fn start_fresh(&mut self) {
        let len = self.test.question_count();
        self.answers = AnswerStore::new(len);
        self.clock = Countdown::new(self.test.duration_seconds());
        self.current_index = 0;
        self.phase = SessionPhase::TakingTest;
        self.persist();
        tracing::debug!("Started test {} with {} questions", self.test.id, len);
    }

    /// Restores from the owner's slot. Returns false when there is nothing
    /// usable, which the caller turns into a fresh start.
    fn restore(&mut self) -> bool {
        let Some(snapshot) = self.slot().and_then(|slot| slot.load()) else {
            return false;
        };

        if snapshot.test_id != self.test.id {
            tracing::debug!(
                "Stale resume data: snapshot is for {}, requested {}",
                snapshot.test_id,
                self.test.id
            );
            return false;
        }

        let len = self.test.question_count();
        let Some(answers) = AnswerStore::restore(snapshot.answers, len) else {
            tracing::debug!("Stale resume data: answer count no longer matches test {}", self.test.id);
            return false;
        };

        self.answers = answers;
        self.clock = Countdown::new(snapshot.seconds_remaining);
        self.current_index = snapshot.current_question_index.min(len - 1);
        self.language = snapshot.language;
        self.phase = SessionPhase::TakingTest;
        tracing::debug!(
            "Resumed test {} at question {} with {}s left",
            self.test.id,
            self.current_index,
            self.clock.remaining()
        );
        true
    }

    fn show_result(&mut self, result: TestResult) {
        let len = self.test.question_count();
        // results saved before answers were persisted get an all-unattempted sheet
        self.answers = AnswerStore::restore(result.answers.clone(), len)
            .unwrap_or_else(|| AnswerStore::new(len));
        self.clock = Countdown::new(0);
        self.result = Some(result);
        self.phase = SessionPhase::Results;
    }

    fn slot(&self) -> Option<ResumeSlot> {
        self.owner
            .as_ref()
            .map(|owner| ResumeSlot::for_user(self.snapshots.clone(), &owner.user_id))
    }

    fn require(&self, phase: SessionPhase, action: &str) -> Result<(), AppError> {
        if self.phase != phase {
            return Err(AppError::InvalidState(format!(
                "Cannot {} while session is {:?}",
                action, self.phase
            )));
        }
        Ok(())
    }

    fn require_answering(&self, action: &str) -> Result<(), AppError> {
        self.require(SessionPhase::TakingTest, action)?;
        if self.submitting {
            return Err(AppError::InvalidState(format!(
                "Cannot {} while submitting",
                action
            )));
        }
        // only a submit is accepted once the clock has run out
        if self.clock.is_expired() {
            return Err(AppError::InvalidState(format!("Cannot {}: time is up", action)));
        }
        Ok(())
    }

    // ---- taking-test -------------------------------------------------------

    pub fn go_to(&mut self, index: usize) -> Result<usize, AppError> {
        self.require_answering("navigate")?;
        if index >= self.test.question_count() {
            return Err(AppError::BadRequest(format!(
                "Question index {} out of range",
                index
            )));
        }
        self.current_index = index;
        Ok(self.current_index)
    }

    pub fn next(&mut self) -> Result<usize, AppError> {
        self.require_answering("navigate")?;
        if self.current_index + 1 < self.test.question_count() {
            self.current_index += 1;
        }
        Ok(self.current_index)
    }

    pub fn previous(&mut self) -> Result<usize, AppError> {
        self.require_answering("navigate")?;
        self.current_index = self.current_index.saturating_sub(1);
        Ok(self.current_index)
    }

    /// Sets or clears (`None`) the answer for a question.
    pub fn set_answer(&mut self, index: usize, key: Option<OptionKey>) -> Result<(), AppError> {
        self.require_answering("answer")?;
        match key {
            Some(key) => self.answers.set_answer(index, key),
            None => self.answers.clear(index),
        }
    }

    pub fn toggle_marked(&mut self, index: usize) -> Result<(), AppError> {
        self.require_answering("mark questions")?;
        self.answers.toggle_marked(index)
    }

    pub fn set_language(&mut self, language: Language) -> Result<(), AppError> {
        if self.phase == SessionPhase::Loading {
            return Err(AppError::InvalidState("Session is still loading".to_string()));
        }
        self.language = language;
        Ok(())
    }

    /// Advances the clock by one second. Only runs while taking the test and
    /// not while a submission is in flight.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::TakingTest || self.submitting {
            return TickOutcome::Idle;
        }
        self.clock.tick()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            test_id: self.test.id.clone(),
            current_question_index: self.current_index,
            answers: self.answers.records().to_vec(),
            seconds_remaining: self.clock.remaining(),
            language: self.language,
            saved_at: Utc::now(),
        }
    }

    /// Writes the resume snapshot. Returns whether anything was written:
    /// only owned sessions that are still being taken have a slot to write.
    pub fn save_snapshot(&self) -> Result<bool, AppError> {
        if self.phase != SessionPhase::TakingTest {
            return Ok(false);
        }
        match self.slot() {
            Some(slot) => {
                slot.save(&self.snapshot())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.save_snapshot() {
            tracing::warn!("Failed to save snapshot for test {}: {}", self.test.id, e);
        }
    }

    /// Navigate-away teardown: one final snapshot so the user can resume.
    pub fn suspend(&self) {
        self.persist();
    }

    /// Explicit quit: the resume slot is cleared.
    pub fn abandon(&mut self) {
        if self.phase != SessionPhase::TakingTest {
            return;
        }
        if let Some(slot) = self.slot() {
            if let Err(e) = slot.discard() {
                tracing::warn!("Failed to discard snapshot {}: {}", slot.key(), e);
            }
        }
        tracing::info!("Session for test {} abandoned", self.test.id);
    }

    // ---- submission --------------------------------------------------------

    /// Grades the sheet and marks a submission as in flight.
    ///
    /// Nothing is discarded here: the caller persists the returned record and
    /// then calls [`finish_submit`](Self::finish_submit) or
    /// [`fail_submit`](Self::fail_submit).
    pub fn begin_submit(&mut self, identity: Option<&Identity>) -> Result<NewTestResult, AppError> {
        self.require(SessionPhase::TakingTest, "submit")?;
        if self.submitting {
            return Err(AppError::Conflict("Submission already in progress".to_string()));
        }

        let identity = identity.ok_or(AppError::AuthRequired)?;
        match &self.owner {
            Some(owner) if owner.user_id != identity.user_id => {
                return Err(AppError::AuthError(
                    "Session belongs to another user".to_string(),
                ));
            }
            Some(_) => {}
            None => self.owner = Some(identity.clone()),
        }

        self.submitting = true;
        Ok(build_result(
            &self.test,
            self.answers.records(),
            identity,
            self.clock.remaining(),
        ))
    }

    /// The result is durably stored: leave taking-test for good.
    pub fn finish_submit(&mut self, result: TestResult) -> Result<(), AppError> {
        if !self.submitting {
            return Err(AppError::InvalidState("No submission in progress".to_string()));
        }

        let len = self.test.question_count();
        if let Some(finalized) = AnswerStore::restore(result.answers.clone(), len) {
            self.answers = finalized;
        }

        if let Some(slot) = self.slot() {
            if let Err(e) = slot.discard() {
                tracing::warn!("Failed to clear snapshot {} after submit: {}", slot.key(), e);
            }
        }

        tracing::info!(
            "Test {} submitted: {}/{} ({:.2}%)",
            self.test.id,
            result.score,
            result.total,
            result.percentage
        );
        self.submitting = false;
        self.result = Some(result);
        self.phase = SessionPhase::Results;
        Ok(())
    }

    /// The write failed: keep answering state and re-save the snapshot with
    /// the clock as it is now.
    pub fn fail_submit(&mut self) {
        self.submitting = false;
        self.persist();
    }

    // ---- results / review --------------------------------------------------

    pub fn view_solutions(&mut self) -> Result<(), AppError> {
        match self.phase {
            SessionPhase::Results | SessionPhase::SolutionReview => {}
            _ => {
                return Err(AppError::InvalidState(
                    "Solutions are available after submission".to_string(),
                ));
            }
        }
        if self.review.is_none() {
            self.review = Some(SolutionReview::new(&self.test, self.answers.records()));
        }
        self.phase = SessionPhase::SolutionReview;
        Ok(())
    }

    pub fn back_to_results(&mut self) -> Result<(), AppError> {
        self.require(SessionPhase::SolutionReview, "return to results")?;
        self.phase = SessionPhase::Results;
        Ok(())
    }

    fn review_mut(&mut self) -> Result<&mut SolutionReview, AppError> {
        self.require(SessionPhase::SolutionReview, "review solutions")?;
        self.review
            .as_mut()
            .ok_or_else(|| AppError::InvalidState("Review not initialised".to_string()))
    }

    pub fn set_review_filter(&mut self, filter: ReviewFilter) -> Result<usize, AppError> {
        let review = self.review_mut()?;
        review.set_filter(filter);
        Ok(review.current())
    }

    pub fn review_next(&mut self) -> Result<usize, AppError> {
        Ok(self.review_mut()?.next())
    }

    pub fn review_previous(&mut self) -> Result<usize, AppError> {
        Ok(self.review_mut()?.previous())
    }

    pub fn review_go_to(&mut self, index: usize) -> Result<usize, AppError> {
        let review = self.review_mut()?;
        if !review.go_to(index) {
            return Err(AppError::BadRequest(format!(
                "Question {} is not in the {:?} filter",
                index,
                review.filter()
            )));
        }
        Ok(review.current())
    }

    // ---- view --------------------------------------------------------------

    pub fn view(&self) -> SessionView {
        let question = match self.phase {
            SessionPhase::TakingTest => self
                .test
                .questions
                .get(self.current_index)
                .map(|q| QuestionView::public(self.current_index, q, self.language)),
            SessionPhase::SolutionReview => self.review.as_ref().and_then(|review| {
                let index = review.current();
                self.test
                    .questions
                    .get(index)
                    .map(|q| QuestionView::with_solution(index, q, self.language))
            }),
            SessionPhase::Loading | SessionPhase::Results => None,
        };

        let review = match (self.phase, &self.review) {
            (SessionPhase::SolutionReview, Some(review)) => Some(ReviewView {
                filter: review.filter(),
                matching: review.matching().to_vec(),
                counts: review.counts(),
                outcome: review.outcome(review.current()),
            }),
            _ => None,
        };

        SessionView {
            test_id: self.test.id.clone(),
            test_title: self.test.title.clone(),
            phase: self.phase,
            current_index: self.current_index,
            question_count: self.test.question_count(),
            seconds_remaining: self.clock.remaining(),
            language: self.language,
            answered_count: self.answers.answered_count(),
            submitting: self.submitting,
            answers: self.answers.records().to_vec(),
            question,
            result: self.result.clone(),
            review,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub filter: ReviewFilter,
    pub matching: Vec<usize>,
    pub counts: OutcomeCounts,
    pub outcome: Option<Outcome>,
}

/// Client-facing state of a session. Correct answers only appear during review.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub test_id: String,
    pub test_title: String,
    pub phase: SessionPhase,
    pub current_index: usize,
    pub question_count: usize,
    pub seconds_remaining: u32,
    pub language: Language,
    pub answered_count: usize,
    pub submitting: bool,
    pub answers: Vec<AnswerRecord>,
    pub question: Option<QuestionView>,
    pub result: Option<TestResult>,
    pub review: Option<ReviewView>,
}

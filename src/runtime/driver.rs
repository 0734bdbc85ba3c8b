// src/runtime/driver.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    config::TICK_SECONDS,
    engine::{
        review::ReviewFilter,
        session::{SessionView, TestSession},
        timer::TickOutcome,
    },
    error::AppError,
    models::{
        question::{Language, OptionKey},
        result::TestResult,
    },
    store::ResultStore,
    utils::jwt::Identity,
};

const COMMAND_BUFFER: usize = 32;

/// Timing knobs for a driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub snapshot_interval: Duration,
    pub idle_timeout: Duration,
}

/// A user action that mutates the session and answers with the new view.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    GoTo(usize),
    Next,
    Previous,
    SetAnswer { index: usize, key: Option<OptionKey> },
    ToggleMarked(usize),
    SetLanguage(Language),
    ViewSolutions,
    BackToResults,
    ReviewFilter(ReviewFilter),
    ReviewNext,
    ReviewPrevious,
    ReviewGoTo(usize),
}

impl SessionInput {
    fn apply(self, session: &mut TestSession) -> Result<(), AppError> {
        match self {
            SessionInput::GoTo(index) => session.go_to(index).map(drop),
            SessionInput::Next => session.next().map(drop),
            SessionInput::Previous => session.previous().map(drop),
            SessionInput::SetAnswer { index, key } => session.set_answer(index, key),
            SessionInput::ToggleMarked(index) => session.toggle_marked(index),
            SessionInput::SetLanguage(language) => session.set_language(language),
            SessionInput::ViewSolutions => session.view_solutions(),
            SessionInput::BackToResults => session.back_to_results(),
            SessionInput::ReviewFilter(filter) => session.set_review_filter(filter).map(drop),
            SessionInput::ReviewNext => session.review_next().map(drop),
            SessionInput::ReviewPrevious => session.review_previous().map(drop),
            SessionInput::ReviewGoTo(index) => session.review_go_to(index).map(drop),
        }
    }
}

enum SessionCommand {
    View(oneshot::Sender<SessionView>),
    Apply(SessionInput, oneshot::Sender<Result<SessionView, AppError>>),
    Submit(Option<Identity>, oneshot::Sender<Result<TestResult, AppError>>),
    Close {
        discard: bool,
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running driver. When the last handle is dropped the
/// driver suspends the session and exits.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    owner_id: Option<String>,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    /// The driver has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn gone(&self) -> AppError {
        AppError::NotFound(format!("Session {} has ended", self.id))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| self.gone())?;
        response.await.map_err(|_| self.gone())
    }

    pub async fn view(&self) -> Result<SessionView, AppError> {
        self.request(SessionCommand::View).await
    }

    pub async fn apply(&self, input: SessionInput) -> Result<SessionView, AppError> {
        self.request(|reply| SessionCommand::Apply(input, reply))
            .await?
    }

    /// Submits the session. The result is stored before this returns.
    pub async fn submit(&self, identity: Option<Identity>) -> Result<TestResult, AppError> {
        self.request(|reply| SessionCommand::Submit(identity, reply))
            .await?
    }

    /// Stops the driver. `discard` drops the resume snapshot, otherwise a
    /// final one is written.
    pub async fn close(&self, discard: bool) -> Result<(), AppError> {
        self.request(|reply| SessionCommand::Close { discard, reply })
            .await
    }
}

/// Moves a session onto its own task.
pub fn spawn_session(
    id: Uuid,
    session: TestSession,
    results: Arc<dyn ResultStore>,
    settings: DriverSettings,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let owner_id = session.owner().map(|o| o.user_id.clone());

    tokio::spawn(run(id, session, rx, results, settings));

    SessionHandle { id, owner_id, tx }
}

async fn run(
    id: Uuid,
    mut session: TestSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    results: Arc<dyn ResultStore>,
    settings: DriverSettings,
) {
    let tick_period = Duration::from_secs(TICK_SECONDS);
    let mut clock = time::interval_at(Instant::now() + tick_period, tick_period);
    clock.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let mut autosave = time::interval_at(
        Instant::now() + settings.snapshot_interval,
        settings.snapshot_interval,
    );
    autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_command = Instant::now();

    tracing::debug!("Session {} started for test {}", id, session.test().id);

    loop {
        tokio::select! {
            // clock first, so a snapshot taken on the same instant sees the tick
            biased;
            _ = clock.tick() => {
                match session.tick() {
                    TickOutcome::Expired => {
                        tracing::info!("Session {}: time is up, submitting", id);
                        let owner = session.owner().cloned();
                        if let Err(e) = submit(&mut session, results.as_ref(), owner.as_ref()).await {
                            tracing::warn!("Session {}: automatic submission failed: {}", id, e);
                        }
                    }
                    TickOutcome::Running(_) => {}
                    TickOutcome::Idle => {
                        if !session.is_clock_running() && last_command.elapsed() >= settings.idle_timeout {
                            tracing::debug!("Session {} idle, shutting down", id);
                            session.suspend();
                            break;
                        }
                    }
                }
            }
            _ = autosave.tick() => {
                if let Err(e) = session.save_snapshot() {
                    tracing::warn!("Session {}: periodic snapshot failed: {}", id, e);
                }
            }
            command = commands.recv() => {
                last_command = Instant::now();
                match command {
                    Some(SessionCommand::View(reply)) => {
                        let _ = reply.send(session.view());
                    }
                    Some(SessionCommand::Apply(input, reply)) => {
                        let outcome = input.apply(&mut session).map(|_| session.view());
                        let _ = reply.send(outcome);
                    }
                    Some(SessionCommand::Submit(identity, reply)) => {
                        let outcome = submit(&mut session, results.as_ref(), identity.as_ref()).await;
                        let _ = reply.send(outcome);
                    }
                    Some(SessionCommand::Close { discard, reply }) => {
                        if discard {
                            session.abandon();
                        } else {
                            session.suspend();
                        }
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        session.suspend();
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!("Session {} stopped", id);
}

/// Grades, stores and finalizes. The store write is awaited here, so no other
/// command for this session runs until it settles.
async fn submit(
    session: &mut TestSession,
    results: &dyn ResultStore,
    identity: Option<&Identity>,
) -> Result<TestResult, AppError> {
    let new_result = session.begin_submit(identity)?;

    match results.create_result(new_result).await {
        Ok(stored) => {
            session.finish_submit(stored.clone())?;
            Ok(stored)
        }
        Err(e) => {
            tracing::error!("Failed to store result for test {}: {}", session.test().id, e);
            session.fail_submit();
            Err(AppError::SubmissionIo(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::engine::scoring::tests::test_with;
    use crate::engine::session::{SessionOptions, SessionPhase};
    use crate::engine::snapshot::snapshot_key;
    use crate::models::result::NewTestResult;
    use crate::store::SnapshotStore;
    use crate::store::memory::{MemoryResultStore, MemorySnapshotStore};

    /// Counts writes, optionally failing them.
    #[derive(Default)]
    struct CountingStore {
        writes: AtomicUsize,
        inner: MemoryResultStore,
    }

    #[async_trait]
    impl ResultStore for CountingStore {
        async fn create_result(&self, result: NewTestResult) -> Result<TestResult, AppError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            // give a concurrent submit the chance to queue up
            time::sleep(Duration::from_millis(200)).await;
            self.inner.create_result(result).await
        }

        async fn get_result(&self, id: Uuid) -> Result<Option<TestResult>, AppError> {
            self.inner.get_result(id).await
        }

        async fn results_for_test(&self, test_id: &str) -> Result<Vec<TestResult>, AppError> {
            self.inner.results_for_test(test_id).await
        }

        async fn results_for_user(
            &self,
            user_id: &str,
            test_id: &str,
        ) -> Result<Vec<TestResult>, AppError> {
            self.inner.results_for_user(user_id, test_id).await
        }
    }

    fn owner() -> Identity {
        Identity {
            user_id: "u1".into(),
            display_name: "Asha".into(),
        }
    }

    fn settings() -> DriverSettings {
        DriverSettings {
            snapshot_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
        }
    }

    fn spawn(
        snapshots: Arc<MemorySnapshotStore>,
        results: Arc<CountingStore>,
        owner: Option<Identity>,
    ) -> SessionHandle {
        let test = Arc::new(test_with(&[OptionKey::A, OptionKey::B], 1, 1.0, 0.25));
        let session = TestSession::open(
            test,
            SessionOptions {
                owner,
                ..Default::default()
            },
            snapshots,
        )
        .unwrap();
        spawn_session(Uuid::new_v4(), session, results, settings())
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_submits_exactly_once() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let results = Arc::new(CountingStore::default());
        let handle = spawn(snapshots.clone(), results.clone(), Some(owner()));

        handle
            .apply(SessionInput::SetAnswer {
                index: 0,
                key: Some(OptionKey::A),
            })
            .await
            .unwrap();

        time::sleep(Duration::from_secs(90)).await;

        let view = handle.view().await.unwrap();
        assert_eq!(view.phase, SessionPhase::Results);
        assert_eq!(view.seconds_remaining, 0);
        assert_eq!(results.writes.load(Ordering::SeqCst), 1);

        let stored = view.result.unwrap();
        assert_eq!(stored.correct_count, 1);
        assert_eq!(stored.time_taken_seconds, Some(60));
        assert!(snapshots.get(&snapshot_key("u1")).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_expiry_freezes_answers_until_submit() {
        let results = Arc::new(CountingStore::default());
        let handle = spawn(Arc::new(MemorySnapshotStore::new()), results.clone(), None);

        time::sleep(Duration::from_secs(90)).await;
        let view = handle.view().await.unwrap();
        assert_eq!(view.phase, SessionPhase::TakingTest);
        assert_eq!(view.seconds_remaining, 0);
        assert_eq!(results.writes.load(Ordering::SeqCst), 0);

        let err = handle
            .apply(SessionInput::SetAnswer {
                index: 0,
                key: Some(OptionKey::A),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let stored = handle.submit(Some(owner())).await.unwrap();
        assert_eq!(stored.correct_count, 0);
        assert_eq!(stored.unattempted_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_auto_submit_can_be_retried() {
        let results = Arc::new(CountingStore::default());
        let handle = spawn(Arc::new(MemorySnapshotStore::new()), results.clone(), Some(owner()));
        handle
            .apply(SessionInput::SetAnswer {
                index: 1,
                key: Some(OptionKey::B),
            })
            .await
            .unwrap();

        results.inner.set_unavailable(true);
        time::sleep(Duration::from_secs(90)).await;
        assert_eq!(results.writes.load(Ordering::SeqCst), 1);
        assert_eq!(handle.view().await.unwrap().phase, SessionPhase::TakingTest);

        let err = handle.apply(SessionInput::ToggleMarked(0)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        results.inner.set_unavailable(false);
        let stored = handle.submit(Some(owner())).await.unwrap();
        assert_eq!(stored.correct_count, 1);
        assert_eq!(results.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn racing_submits_store_once() {
        let results = Arc::new(CountingStore::default());
        let handle = spawn(Arc::new(MemorySnapshotStore::new()), results.clone(), Some(owner()));

        let (first, second) = tokio::join!(
            handle.submit(Some(owner())),
            handle.submit(Some(owner()))
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(AppError::InvalidState(_))));
        assert_eq!(results.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_ticks_once_per_second() {
        let handle = spawn(
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(CountingStore::default()),
            None,
        );
        time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(handle.view().await.unwrap().seconds_remaining, 55);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_reported_and_recoverable() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let results = Arc::new(CountingStore::default());
        let handle = spawn(snapshots.clone(), results.clone(), Some(owner()));

        results.inner.set_unavailable(true);
        let err = handle.submit(Some(owner())).await.unwrap_err();
        assert!(matches!(err, AppError::SubmissionIo(_)));

        let view = handle.view().await.unwrap();
        assert_eq!(view.phase, SessionPhase::TakingTest);
        assert!(!view.submitting);
        assert!(snapshots.get(&snapshot_key("u1")).unwrap().is_some());

        results.inner.set_unavailable(false);
        handle.submit(Some(owner())).await.unwrap();
        assert_eq!(handle.view().await.unwrap().phase, SessionPhase::Results);
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_submit_requires_identity() {
        let results = Arc::new(CountingStore::default());
        let handle = spawn(Arc::new(MemorySnapshotStore::new()), results.clone(), None);

        let err = handle.submit(None).await.unwrap_err();
        assert!(matches!(err, AppError::AuthRequired));
        assert_eq!(results.writes.load(Ordering::SeqCst), 0);

        let stored = handle.submit(Some(owner())).await.unwrap();
        assert_eq!(stored.user_id, "u1");
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_and_final_snapshots() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let handle = spawn(snapshots.clone(), Arc::new(CountingStore::default()), Some(owner()));
        let key = snapshot_key("u1");
        let saved_clock = |snapshots: &MemorySnapshotStore| {
            let raw = snapshots.get(&key).unwrap().unwrap();
            serde_json::from_str::<crate::models::snapshot::SessionSnapshot>(&raw)
                .unwrap()
                .seconds_remaining
        };

        time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(saved_clock(&snapshots), 50);

        time::sleep(Duration::from_secs(3)).await;
        handle.close(false).await.unwrap();
        assert_eq!(saved_clock(&snapshots), 47);
        assert!(handle.view().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn discard_on_close_clears_snapshot() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let handle = spawn(snapshots.clone(), Arc::new(CountingStore::default()), Some(owner()));

        handle.close(true).await.unwrap();
        assert!(snapshots.get(&snapshot_key("u1")).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_input_keeps_session() {
        let handle = spawn(
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(CountingStore::default()),
            None,
        );
        let err = handle.apply(SessionInput::GoTo(7)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = handle.apply(SessionInput::ViewSolutions).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let view = handle.apply(SessionInput::Next).await.unwrap();
        assert_eq!(view.current_index, 1);
    }
}

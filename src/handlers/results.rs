// src/handlers/results.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    engine::comparison::compare,
    error::AppError,
    models::result::{ResultsView, TestResult},
    state::AppState,
    store::ResultStore,
    utils::jwt::Identity,
};

/// Builds the results screen for `result`.
///
/// The comparison is recomputed from every result of the test on each call.
/// If that read fails the user's own score is still returned, with the
/// comparison left out and the reason attached.
pub(crate) async fn results_view(
    results: &dyn ResultStore,
    result: TestResult,
    viewer_id: &str,
    leaderboard_size: usize,
) -> ResultsView {
    match results.results_for_test(&result.test_id).await {
        Ok(population) => {
            let comparison = compare(&result, &population, viewer_id, leaderboard_size);
            ResultsView {
                result,
                comparison: Some(comparison),
                comparison_error: None,
            }
        }
        Err(e) => {
            tracing::warn!("Comparison unavailable for test {}: {}", result.test_id, e);
            ResultsView {
                result,
                comparison: None,
                comparison_error: Some("Comparison data is temporarily unavailable".to_string()),
            }
        }
    }
}

/// A stored result with its comparison. Only the owner may read it.
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .results
        .get_result(id)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;

    if result.user_id != identity.user_id {
        return Err(AppError::AuthError(
            "Result belongs to another user".to_string(),
        ));
    }

    let view = results_view(
        state.results.as_ref(),
        result,
        &identity.user_id,
        state.config.leaderboard_size,
    )
    .await;
    Ok(Json(view))
}

/// The caller's attempts at one test, oldest first.
pub async fn my_results(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let history = state
        .results
        .results_for_user(&identity.user_id, &test_id)
        .await?;
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::models::result::NewTestResult;
    use crate::store::memory::MemoryResultStore;

    /// Writes and point reads work, population reads fail.
    #[derive(Default)]
    struct NoPopulation(MemoryResultStore);

    #[async_trait]
    impl ResultStore for NoPopulation {
        async fn create_result(&self, result: NewTestResult) -> Result<TestResult, AppError> {
            self.0.create_result(result).await
        }

        async fn get_result(&self, id: Uuid) -> Result<Option<TestResult>, AppError> {
            self.0.get_result(id).await
        }

        async fn results_for_test(&self, _test_id: &str) -> Result<Vec<TestResult>, AppError> {
            Err(AppError::InternalServerError("read timed out".to_string()))
        }

        async fn results_for_user(
            &self,
            user_id: &str,
            test_id: &str,
        ) -> Result<Vec<TestResult>, AppError> {
            self.0.results_for_user(user_id, test_id).await
        }
    }

    fn stored(user: &str, percentage: f64) -> TestResult {
        NewTestResult {
            user_id: user.into(),
            user_name: user.to_uppercase(),
            test_id: "t1".into(),
            test_title: "Mock".into(),
            category_id: None,
            category_name: None,
            score: percentage / 10.0,
            total: 10.0,
            correct_count: 0,
            incorrect_count: 0,
            unattempted_count: 0,
            percentage,
            answers: vec![],
            time_taken_seconds: None,
        }
        .into_result(Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn failed_population_read_keeps_own_score() {
        let store = NoPopulation::default();
        let view = results_view(&store, stored("u1", 62.5), "u1", 10).await;

        assert_eq!(view.result.percentage, 62.5);
        assert!(view.comparison.is_none());
        assert!(view.comparison_error.is_some());
    }

    #[tokio::test]
    async fn comparison_includes_target() {
        let store = MemoryResultStore::new();
        store.insert(stored("u2", 80.0)).unwrap();
        let mine = stored("u1", 40.0);
        store.insert(mine.clone()).unwrap();

        let view = results_view(&store, mine, "u1", 10).await;
        let comparison = view.comparison.unwrap();
        assert_eq!(comparison.rank, 2);
        assert_eq!(comparison.participant_count, 2);
        assert!(comparison.leaderboard[1].is_current_user);
        assert!(view.comparison_error.is_none());
    }
}

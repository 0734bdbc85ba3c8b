// src/handlers/catalog.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    engine::comparison::leaderboard,
    error::AppError,
    models::test::{PublishStatus, Test, TestSummary},
    state::AppState,
    store::TestCatalog,
    utils::jwt::MaybeIdentity,
};

/// Query parameters for listing tests.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
}

/// Fetches a published test. Drafts are reported as missing.
pub(crate) async fn load_published(catalog: &dyn TestCatalog, id: &str) -> Result<Test, AppError> {
    catalog
        .get_test(id)
        .await?
        .filter(|test| test.status == PublishStatus::Published)
        .ok_or_else(|| AppError::NotFound(format!("Test {} not found", id)))
}

/// Lists published tests, optionally filtered by category.
pub async fn list_tests(
    State(catalog): State<Arc<dyn TestCatalog>>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let tests = catalog.list_published(params.category.as_deref()).await?;
    let summaries: Vec<TestSummary> = tests.iter().map(TestSummary::from).collect();
    Ok(Json(summaries))
}

pub async fn get_test(
    State(catalog): State<Arc<dyn TestCatalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let test = load_published(catalog.as_ref(), &id).await?;
    Ok(Json(TestSummary::from(&test)))
}

/// Best score per user for a test. The caller's row is flagged when signed in.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(MaybeIdentity(identity)): Extension<MaybeIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let test = load_published(state.catalog.as_ref(), &id).await?;
    let population = state.results.results_for_test(&test.id).await?;
    let viewer = identity.as_ref().map(|i| i.user_id.as_str()).unwrap_or_default();

    Ok(Json(leaderboard(
        &population,
        viewer,
        state.config.leaderboard_size,
    )))
}

// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{
        review::ReviewFilter,
        session::{SessionAction, SessionOptions, SessionView},
    },
    error::AppError,
    handlers::{catalog::load_published, results::results_view},
    models::{
        question::{Language, OptionKey},
        result::ResultsView,
    },
    runtime::{SessionInput, SessionRegistry},
    state::AppState,
    utils::jwt::MaybeIdentity,
};

/// DTO for opening a session.
#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionRequest {
    #[serde(default)]
    pub action: SessionAction,
    #[serde(default)]
    pub language: Language,
    /// Result to display, for `show-result`.
    pub result_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OpenSessionResponse {
    pub session_id: Uuid,
    pub view: SessionView,
}

/// Opens a session on a published test.
///
/// * `start` begins a fresh attempt.
/// * `resume` restores the caller's saved progress, or starts fresh.
/// * `show-result` loads one of the caller's stored results for review.
pub async fn open_session(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Extension(MaybeIdentity(identity)): Extension<MaybeIdentity>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let test = load_published(state.catalog.as_ref(), &test_id).await?;

    let prior_result = match payload.action {
        SessionAction::ShowResult => {
            let viewer = identity.as_ref().ok_or(AppError::AuthRequired)?;
            let result_id = payload.result_id.ok_or_else(|| {
                AppError::BadRequest("result_id is required to show a result".to_string())
            })?;
            let result = state
                .results
                .get_result(result_id)
                .await?
                .ok_or(AppError::NotFound("Result not found".to_string()))?;
            if result.user_id != viewer.user_id {
                return Err(AppError::AuthError(
                    "Result belongs to another user".to_string(),
                ));
            }
            Some(result)
        }
        _ => None,
    };

    let options = SessionOptions {
        action: payload.action,
        language: payload.language,
        prior_result,
        owner: identity,
    };

    let (session_id, view) = state.sessions.open(Arc::new(test), options).await?;

    Ok((
        StatusCode::CREATED,
        Json(OpenSessionResponse { session_id, view }),
    ))
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.get(id)?.view().await?;
    Ok(Json(view))
}

async fn apply(
    sessions: &SessionRegistry,
    id: Uuid,
    input: SessionInput,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions.get(id)?.apply(input).await?;
    Ok(Json(view))
}

/// DTO for answering. `null` clears the answer.
#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1, max = 1, message = "Answer must be a single option letter."))]
    pub key: Option<String>,
}

pub async fn set_answer(
    State(sessions): State<SessionRegistry>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let key = payload
        .key
        .as_deref()
        .map(str::parse::<OptionKey>)
        .transpose()?;

    apply(&sessions, id, SessionInput::SetAnswer { index, key }).await
}

pub async fn toggle_mark(
    State(sessions): State<SessionRegistry>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, AppError> {
    apply(&sessions, id, SessionInput::ToggleMarked(index)).await
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum NavigateTarget {
    Index(usize),
    Step(Step),
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub to: NavigateTarget,
}

pub async fn navigate(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = match payload.to {
        NavigateTarget::Index(index) => SessionInput::GoTo(index),
        NavigateTarget::Step(Step::Next) => SessionInput::Next,
        NavigateTarget::Step(Step::Previous) => SessionInput::Previous,
    };
    apply(&sessions, id, input).await
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: Language,
}

pub async fn set_language(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LanguageRequest>,
) -> Result<impl IntoResponse, AppError> {
    apply(&sessions, id, SessionInput::SetLanguage(payload.language)).await
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub results: ResultsView,
    pub view: SessionView,
}

/// Submits the session and returns the results screen.
///
/// Anonymous callers get 401 and keep their session; signing in and
/// submitting again works.
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(MaybeIdentity(identity)): Extension<MaybeIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.get(id)?;
    let stored = handle.submit(identity).await?;

    let viewer = stored.user_id.clone();
    let results = results_view(
        state.results.as_ref(),
        stored,
        &viewer,
        state.config.leaderboard_size,
    )
    .await;
    let view = handle.view().await?;

    Ok(Json(SubmitResponse { results, view }))
}

pub async fn view_solutions(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    apply(&sessions, id, SessionInput::ViewSolutions).await
}

pub async fn back_to_results(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    apply(&sessions, id, SessionInput::BackToResults).await
}

/// Review controls. The filter is applied before moving the cursor.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub filter: Option<ReviewFilter>,
    pub step: Option<Step>,
    pub index: Option<usize>,
}

pub async fn review(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = sessions.get(id)?;

    let mut inputs = Vec::new();
    if let Some(filter) = payload.filter {
        inputs.push(SessionInput::ReviewFilter(filter));
    }
    if let Some(index) = payload.index {
        inputs.push(SessionInput::ReviewGoTo(index));
    }
    match payload.step {
        Some(Step::Next) => inputs.push(SessionInput::ReviewNext),
        Some(Step::Previous) => inputs.push(SessionInput::ReviewPrevious),
        None => {}
    }

    let mut view = None;
    for input in inputs {
        view = Some(handle.apply(input).await?);
    }
    let view = match view {
        Some(view) => view,
        None => handle.view().await?,
    };

    Ok(Json(view))
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseParams {
    #[serde(default)]
    pub discard: bool,
}

/// Leaves a session. Without `discard` the progress stays resumable.
pub async fn close_session(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Query(params): Query<CloseParams>,
) -> Result<impl IntoResponse, AppError> {
    sessions.close(id, params.discard).await?;
    Ok(StatusCode::NO_CONTENT)
}

// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{catalog, results, session},
    state::AppState,
    utils::jwt::{auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Catalog and session routes accept anonymous callers; a bearer token, when
///   present, must be valid.
/// * Result routes require a signed-in caller.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let test_routes = Router::new()
        .route("/", get(catalog::list_tests))
        .route("/{id}", get(catalog::get_test))
        .route("/{id}/leaderboard", get(catalog::get_leaderboard))
        .route("/{id}/sessions", post(session::open_session))
        .merge(
            Router::new()
                .route("/{id}/results/me", get(results::my_results))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let session_routes = Router::new()
        .route(
            "/{id}",
            get(session::get_session).delete(session::close_session),
        )
        .route("/{id}/answers/{index}", put(session::set_answer))
        .route("/{id}/answers/{index}/mark", post(session::toggle_mark))
        .route("/{id}/navigate", post(session::navigate))
        .route("/{id}/language", put(session::set_language))
        .route("/{id}/submit", post(session::submit))
        .route("/{id}/solutions", post(session::view_solutions))
        .route("/{id}/results", post(session::back_to_results))
        .route("/{id}/review", post(session::review))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let result_routes = Router::new()
        .route("/{id}", get(results::get_result))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/tests", test_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/results", result_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        store::memory::{MemoryResultStore, MemorySnapshotStore, MemoryTestCatalog},
        utils::jwt::sign_jwt,
    };

    fn app() -> Router {
        let state = AppState::new(
            Config::for_testing("secret"),
            Arc::new(MemoryResultStore::new()),
            Arc::new(MemoryTestCatalog::new()),
            Arc::new(MemorySnapshotStore::new()),
        );
        create_router(state)
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn result_routes_require_token() {
        let response = app()
            .oneshot(
                Request::get(format!("/api/results/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn errors_are_json() {
        let token = sign_jwt("u1", "Asha", "secret", 60).unwrap();
        let response = app()
            .oneshot(
                Request::get(format!("/api/results/{}", uuid::Uuid::new_v4()))
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Result not found");
    }

    #[tokio::test]
    async fn unknown_test_cannot_be_opened() {
        let response = app()
            .oneshot(
                Request::post("/api/tests/nope/sessions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"action":"start"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// ABOUTME: Route definitions for the gistd HTTP API.
// ABOUTME: Assembles workflow, status, and provider routes into one Axum Router.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::workflows;
use crate::app_state::SharedState;
use crate::auth::AuthLayer;

/// Build the complete Axum router with all routes and shared state.
/// Bearer auth is applied to /api/* when the state carries a token.
pub fn create_router(state: SharedState) -> Router {
    let auth_token = state.auth_token.clone();

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/providers", get(workflows::provider_status))
        .route("/api/workflows", get(workflows::list_runs))
        .route(
            "/api/workflows/summarizer/sync",
            post(workflows::summarize_sync),
        )
        .route(
            "/api/workflows/summarizer-multi/sync",
            post(workflows::summarize_multi_sync),
        )
        .route(
            "/api/workflows/summarizer/run",
            post(workflows::summarize_run),
        )
        .route(
            "/api/workflows/summarizer-all/run",
            post(workflows::summarize_all_run),
        )
        .route(
            "/api/workflows/summarizer/retrigger",
            post(workflows::summarize_retrigger),
        )
        .route(
            "/api/workflows/status/{workflow_id}",
            get(workflows::run_status),
        )
        .route(
            "/api/workflows/summarizer/{workflow_id}/status",
            get(workflows::run_status),
        )
        .route(
            "/api/workflows/summarizer-all/{workflow_id}/status",
            get(workflows::run_status),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    match auth_token {
        Some(token) => router.layer(AuthLayer::new(token)),
        None => router,
    }
}

/// Health check handler. Stays outside the auth layer.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

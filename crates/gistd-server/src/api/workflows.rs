// ABOUTME: Workflow API handlers: sync and async summarizer runs, status polling, listing.
// ABOUTME: Sync endpoints block up to a wall-clock timeout; status falls back to the journal.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use gistd_agent::{WorkflowError, start_all_types, start_one_type};
use gistd_core::{
    InternalSummariesAllResult, InternalSummaryResult, RunOutput, RunStatus, SummariesResult,
    SummaryInput, SummaryOutput, WorkflowInfo, WorkflowInput, estimate_tokens,
};

use crate::app_state::{AppState, SharedState, track_run};

/// How long the blocking single-type endpoint waits for a result.
const SYNC_ONE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How long the blocking multi-type endpoint waits for a result.
const SYNC_ALL_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Iteration ceiling for the blocking multi-type endpoint.
const MAX_SYNC_ITERATIONS: u32 = 3;

/// Reject content whose estimated token count exceeds the configured ceiling.
fn check_input_size(state: &AppState, input: &WorkflowInput<SummaryInput>) -> Result<(), Response> {
    let Some(limit) = state.max_input_tokens else {
        return Ok(());
    };
    let tokens = estimate_tokens(&input.agent_input.context.content);
    if tokens > limit {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({
                "error": format!("input too large: {} tokens exceeds limit of {}", tokens, limit),
            })),
        )
            .into_response());
    }
    Ok(())
}

fn run_failure(wid: &str, err: WorkflowError) -> Response {
    let body = match err {
        WorkflowError::ResultTimeout(after) => json!({
            "message": format!("workflow did not complete within {:?}", after),
            "workflow_id": wid,
            "timeout": true,
        }),
        other => json!({
            "message": other.to_string(),
            "workflow_id": wid,
        }),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Project the internal single-type result down to the best summary.
fn one_type_output(output: RunOutput<Value>) -> Result<RunOutput<SummaryOutput>, String> {
    let value = output
        .result
        .ok_or_else(|| "run completed without a result".to_string())?;
    let internal: InternalSummaryResult =
        serde_json::from_value(value).map_err(|e| format!("unexpected result shape: {}", e))?;
    Ok(RunOutput {
        result: Some(internal.summary),
        metadata: output.metadata,
        cost: output.cost,
        workflow_info: output.workflow_info,
    })
}

/// Project the internal multi-type result down to the public map.
fn all_types_output(output: RunOutput<Value>) -> Result<RunOutput<SummariesResult>, String> {
    let value = output
        .result
        .ok_or_else(|| "run completed without a result".to_string())?;
    let internal: InternalSummariesAllResult =
        serde_json::from_value(value).map_err(|e| format!("unexpected result shape: {}", e))?;
    Ok(RunOutput {
        result: Some(internal.into()),
        metadata: output.metadata,
        cost: output.cost,
        workflow_info: output.workflow_info,
    })
}

/// POST /api/workflows/summarizer/sync - run one summary type, blocking.
pub async fn summarize_sync(
    State(state): State<SharedState>,
    Json(input): Json<WorkflowInput<SummaryInput>>,
) -> Response {
    if let Err(resp) = check_input_size(&state, &input) {
        return resp;
    }

    let handle = start_one_type(Arc::clone(&state.env), input);
    let wid = handle.info.wid.clone();
    track_run(&state, handle.clone()).await;

    match handle.wait(SYNC_ONE_TIMEOUT).await {
        Ok(output) => match one_type_output(output) {
            Ok(out) => (StatusCode::OK, Json(out)).into_response(),
            Err(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": message, "workflow_id": wid })),
            )
                .into_response(),
        },
        Err(err) => run_failure(&wid, err),
    }
}

/// POST /api/workflows/summarizer-multi/sync - run every summary type, blocking.
pub async fn summarize_multi_sync(
    State(state): State<SharedState>,
    Json(mut input): Json<WorkflowInput<SummaryInput>>,
) -> Response {
    if let Err(resp) = check_input_size(&state, &input) {
        return resp;
    }

    if input.agent_input.context.iterations > MAX_SYNC_ITERATIONS {
        tracing::warn!(
            requested = input.agent_input.context.iterations,
            clamped = MAX_SYNC_ITERATIONS,
            "clamping iterations for the blocking multi-type endpoint"
        );
        input.agent_input.context.iterations = MAX_SYNC_ITERATIONS;
    }

    let handle = start_all_types(Arc::clone(&state.env), input);
    let wid = handle.info.wid.clone();
    track_run(&state, handle.clone()).await;

    match handle.wait(SYNC_ALL_TIMEOUT).await {
        Ok(output) => match all_types_output(output) {
            Ok(out) => (StatusCode::OK, Json(out)).into_response(),
            Err(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": message, "workflow_id": wid })),
            )
                .into_response(),
        },
        Err(err) => run_failure(&wid, err),
    }
}

/// POST /api/workflows/summarizer/run - start a single-type run, return its id.
pub async fn summarize_run(
    State(state): State<SharedState>,
    Json(input): Json<WorkflowInput<SummaryInput>>,
) -> Response {
    if let Err(resp) = check_input_size(&state, &input) {
        return resp;
    }

    let handle = start_one_type(Arc::clone(&state.env), input);
    let wid = handle.info.wid.clone();
    track_run(&state, handle).await;

    (StatusCode::OK, Json(json!({ "workflow_id": wid }))).into_response()
}

/// POST /api/workflows/summarizer-all/run - start an all-types run, return its id.
pub async fn summarize_all_run(
    State(state): State<SharedState>,
    Json(input): Json<WorkflowInput<SummaryInput>>,
) -> Response {
    if let Err(resp) = check_input_size(&state, &input) {
        return resp;
    }

    let handle = start_all_types(Arc::clone(&state.env), input);
    let wid = handle.info.wid.clone();
    track_run(&state, handle).await;

    (StatusCode::OK, Json(json!({ "workflow_id": wid }))).into_response()
}

/// POST /api/workflows/summarizer/retrigger - same input, fresh workflow id.
pub async fn summarize_retrigger(
    State(state): State<SharedState>,
    Json(mut input): Json<WorkflowInput<SummaryInput>>,
) -> Response {
    if let Err(resp) = check_input_size(&state, &input) {
        return resp;
    }

    // A retrigger always gets a freshly assigned id, whatever was submitted.
    input.wid = WorkflowInfo::default();

    let handle = start_one_type(Arc::clone(&state.env), input);
    let wid = handle.info.wid.clone();
    track_run(&state, handle).await;

    (StatusCode::OK, Json(json!({ "workflow_id": wid }))).into_response()
}

/// GET /api/workflows/status/{workflow_id} - progress and result for one run.
///
/// Live runs answer from the registry with the full step timeline; finished
/// runs evicted from memory answer from the journal. Unknown ids are 404.
pub async fn run_status(
    State(state): State<SharedState>,
    Path(workflow_id): Path<String>,
) -> Response {
    let handle = state.runs.read().await.get(&workflow_id).cloned();

    if let Some(handle) = handle {
        let status = handle.status();
        if status == RunStatus::Failed {
            let detail = match handle.outcome().await {
                Some(Err(message)) => message,
                _ => "workflow failed".to_string(),
            };
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": detail,
                    "workflow_id": workflow_id,
                    "workflow_status": status,
                })),
            )
                .into_response();
        }

        let progress = handle.progress().await;
        return (
            StatusCode::OK,
            Json(json!({
                "workflow_id": workflow_id,
                "workflow_status": status,
                "status_timeline": progress.status_timeline,
                "input": progress.input,
                "result": progress.result,
                "last_heartbeat": progress.last_heartbeat,
            })),
        )
            .into_response();
    }

    match state.store.lock().await.find(&workflow_id) {
        Ok(Some(record)) if record.status == RunStatus::Failed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": record.error.unwrap_or_else(|| "workflow failed".to_string()),
                "workflow_id": workflow_id,
                "workflow_status": record.status,
            })),
        )
            .into_response(),
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(json!({
                "workflow_id": workflow_id,
                "workflow_status": record.status,
                "result": record.result,
            })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "workflow not found",
                "workflow_id": workflow_id,
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(wid = %workflow_id, error = %err, "journal lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "journal lookup failed",
                    "workflow_id": workflow_id,
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/workflows - list known runs, live registry first, then journal.
pub async fn list_runs(State(state): State<SharedState>) -> Response {
    let mut items = Vec::new();
    let mut live = std::collections::HashSet::new();

    {
        let runs = state.runs.read().await;
        for (wid, handle) in runs.iter() {
            live.insert(wid.clone());
            items.push(json!({
                "workflow_id": wid,
                "name": handle.info.name,
                "workflow_status": handle.status(),
            }));
        }
    }

    match state.store.lock().await.list(100) {
        Ok(summaries) => {
            for summary in summaries {
                if !live.contains(&summary.wid) {
                    items.push(json!({
                        "workflow_id": summary.wid,
                        "name": summary.name,
                        "workflow_status": summary.status,
                    }));
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to list journaled runs");
        }
    }

    (StatusCode::OK, Json(json!({ "workflows": items }))).into_response()
}

/// GET /api/providers - redacted provider configuration status.
pub async fn provider_status(State(state): State<SharedState>) -> Response {
    (StatusCode::OK, Json(state.provider_status.clone())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_router;
    use axum::body::Body;
    use chrono::Utc;
    use gistd_agent::testing::{MockClientFactory, MockLlmClient};
    use gistd_agent::{AgentEnv, LlmCredentials};
    use gistd_core::{AgentsConfig, AliasResolver, ModelProvidersConfig};
    use gistd_store::{RunRecord, RunStore};
    use http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::providers::ProviderStatus;

    fn summary_json(title: &str) -> String {
        format!(
            r###"{{"short_version": "## {t}", "description": "d", "title": "{t}", "tags": [], "language": "en"}}"###,
            t = title
        )
    }

    const GRADE_NINE: &str =
        r#"{"grade": 9, "feedbacks": [], "grade_reasoning": "r", "missing_entities": []}"#;

    fn scripted_client() -> Arc<MockLlmClient> {
        Arc::new(MockLlmClient::respond_with(|request| {
            let system = request
                .messages
                .first()
                .map(|m| m.content.as_str())
                .unwrap_or("");
            if system.contains("reviewer of") {
                Ok(MockLlmClient::text(GRADE_NINE))
            } else {
                Ok(MockLlmClient::text(&summary_json("ApiBest")))
            }
        }))
    }

    fn state_with(dir: &TempDir, client: Arc<MockLlmClient>) -> SharedState {
        let env = Arc::new(AgentEnv::new(
            AgentsConfig::new(),
            ModelProvidersConfig::default(),
            AliasResolver::empty(),
            Arc::new(MockClientFactory::new(client)),
        ));
        let store = RunStore::open(dir.path()).unwrap();
        Arc::new(AppState::new(
            env,
            store,
            ProviderStatus::from_credentials(&LlmCredentials::default()),
        ))
    }

    fn test_state(dir: &TempDir) -> SharedState {
        state_with(dir, scripted_client())
    }

    fn run_body(iterations: u32) -> Body {
        let body = json!({
            "agent_input": {
                "context": {
                    "content": "The Q3 deal closed at 4.2 million.",
                    "to_language": "en",
                    "iterations": iterations,
                },
                "llm_input": "",
            }
        });
        Body::from(serde_json::to_vec(&body).unwrap())
    }

    async fn json_body(resp: Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn post(state: &SharedState, uri: &str, body: Body) -> Response {
        create_router(Arc::clone(state))
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get(state: &SharedState, uri: &str) -> Response {
        create_router(Arc::clone(state))
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sync_returns_the_best_summary_only() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let resp = post(&state, "/api/workflows/summarizer/sync", run_body(2)).await;
        assert_eq!(resp.status(), 200);

        let json = json_body(resp).await;
        assert_eq!(json["result"]["title"], "ApiBest");
        // Internals stay internal.
        assert!(json["result"].get("grades").is_none());
        assert!(json["cost"].is_object());
        assert!(
            json["workflow_info"]["wid"]
                .as_str()
                .unwrap()
                .starts_with("summarizer-one-type-")
        );
    }

    #[tokio::test]
    async fn multi_sync_returns_public_map() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let resp = post(&state, "/api/workflows/summarizer-multi/sync", run_body(1)).await;
        assert_eq!(resp.status(), 200);

        let json = json_body(resp).await;
        assert_eq!(json["result"]["summaries"]["machine"]["title"], "ApiBest");
        assert_eq!(json["result"]["summaries"]["pretty"]["title"], "ApiBest");
        assert!(json["result"]["summaries"]["machine"].get("grades").is_none());
    }

    #[tokio::test]
    async fn async_run_completes_and_reports_timeline() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let resp = post(&state, "/api/workflows/summarizer/run", run_body(1)).await;
        assert_eq!(resp.status(), 200);
        let wid = json_body(resp).await["workflow_id"]
            .as_str()
            .unwrap()
            .to_string();

        let mut status_json = Value::Null;
        for _ in 0..200 {
            let resp = get(&state, &format!("/api/workflows/status/{}", wid)).await;
            assert_eq!(resp.status(), 200);
            status_json = json_body(resp).await;
            if status_json["workflow_status"] == "completed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(status_json["workflow_status"], "completed");
        assert_eq!(status_json["result"]["summary"]["title"], "ApiBest");
        let timeline = status_json["status_timeline"].as_array().unwrap();
        assert!(
            timeline
                .iter()
                .any(|e| e["step"] == "Workflow End" && e["status"] == "completed")
        );
    }

    #[tokio::test]
    async fn per_workflow_status_routes_alias_the_generic_poller() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let resp = post(&state, "/api/workflows/summarizer/run", run_body(1)).await;
        let wid = json_body(resp).await["workflow_id"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = get(
            &state,
            &format!("/api/workflows/summarizer/{}/status", wid),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(json_body(resp).await["workflow_id"], wid.as_str());
    }

    #[tokio::test]
    async fn unknown_workflow_id_is_404_with_the_id_attached() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let resp = get(&state, "/api/workflows/status/no-such-run").await;
        assert_eq!(resp.status(), 404);

        let json = json_body(resp).await;
        assert_eq!(json["error"], "workflow not found");
        assert_eq!(json["workflow_id"], "no-such-run");
    }

    #[tokio::test]
    async fn failed_run_status_is_500_with_detail() {
        let dir = TempDir::new().unwrap();
        // Nothing this client returns ever parses, so the loop produces
        // zero candidates and the run fails.
        let state = state_with(
            &dir,
            Arc::new(MockLlmClient::respond_with(|_| {
                Ok(MockLlmClient::text("not json"))
            })),
        );

        let resp = post(&state, "/api/workflows/summarizer/run", run_body(1)).await;
        let wid = json_body(resp).await["workflow_id"]
            .as_str()
            .unwrap()
            .to_string();

        let mut last_status = StatusCode::OK;
        let mut json = Value::Null;
        for _ in 0..200 {
            let resp = get(&state, &format!("/api/workflows/status/{}", wid)).await;
            last_status = resp.status();
            json = json_body(resp).await;
            if last_status == StatusCode::INTERNAL_SERVER_ERROR {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(last_status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["workflow_status"], "failed");
        assert_eq!(json["workflow_id"], wid.as_str());
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .contains("no summaries generated")
        );
    }

    #[tokio::test]
    async fn oversized_input_is_rejected_before_any_run_starts() {
        let dir = TempDir::new().unwrap();
        let env = Arc::new(AgentEnv::new(
            AgentsConfig::new(),
            ModelProvidersConfig::default(),
            AliasResolver::empty(),
            Arc::new(MockClientFactory::new(scripted_client())),
        ));
        let store = RunStore::open(dir.path()).unwrap();
        let mut state = AppState::new(
            env,
            store,
            ProviderStatus::from_credentials(&LlmCredentials::default()),
        );
        state.max_input_tokens = Some(5);
        let state = Arc::new(state);

        let resp = post(&state, "/api/workflows/summarizer/sync", run_body(1)).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let json = json_body(resp).await;
        assert!(json["error"].as_str().unwrap().contains("input too large"));
        assert!(state.runs.read().await.is_empty());
    }

    #[tokio::test]
    async fn retrigger_assigns_a_fresh_id_each_time() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let first = post(&state, "/api/workflows/summarizer/retrigger", run_body(1)).await;
        let second = post(&state, "/api/workflows/summarizer/retrigger", run_body(1)).await;

        let first_id = json_body(first).await["workflow_id"]
            .as_str()
            .unwrap()
            .to_string();
        let second_id = json_body(second).await["workflow_id"]
            .as_str()
            .unwrap()
            .to_string();

        assert_ne!(first_id, second_id);
        let runs = state.runs.read().await;
        assert!(runs.contains_key(&first_id));
        assert!(runs.contains_key(&second_id));
    }

    #[tokio::test]
    async fn status_falls_back_to_the_journal() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let record = RunRecord {
            wid: "summarizer-one-type-archived".to_string(),
            name: "SummarizerOneType".to_string(),
            status: RunStatus::Completed,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            result: Some(json!({ "summary": { "title": "FromJournal" } })),
            error: None,
        };
        state.store.lock().await.record(&record).unwrap();

        let resp = get(
            &state,
            "/api/workflows/status/summarizer-one-type-archived",
        )
        .await;
        assert_eq!(resp.status(), 200);

        let json = json_body(resp).await;
        assert_eq!(json["workflow_status"], "completed");
        assert_eq!(json["result"]["summary"]["title"], "FromJournal");
    }

    #[tokio::test]
    async fn list_merges_registry_and_journal() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let record = RunRecord {
            wid: "summarizer-all-old".to_string(),
            name: "SummarizerAll".to_string(),
            status: RunStatus::Completed,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            result: None,
            error: None,
        };
        state.store.lock().await.record(&record).unwrap();

        let resp = post(&state, "/api/workflows/summarizer/run", run_body(1)).await;
        let live_id = json_body(resp).await["workflow_id"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = get(&state, "/api/workflows").await;
        assert_eq!(resp.status(), 200);

        let json = json_body(resp).await;
        let ids: Vec<&str> = json["workflows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["workflow_id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&live_id.as_str()));
        assert!(ids.contains(&"summarizer-all-old"));
    }

    #[tokio::test]
    async fn provider_status_is_served() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let resp = get(&state, "/api/providers").await;
        assert_eq!(resp.status(), 200);

        let json = json_body(resp).await;
        assert_eq!(json["providers"].as_array().unwrap().len(), 3);
        assert_eq!(json["any_available"], false);
    }
}

// ABOUTME: Shared application state for the gistd HTTP server.
// ABOUTME: Live run registry, the run journal, and the per-run persister task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use gistd_agent::{AgentEnv, RunHandle, WorkflowError};
use gistd_core::RunStatus;
use gistd_store::{RunRecord, RunStore};

use crate::providers::ProviderStatus;

/// How long the persister waits for a run before giving up on journaling it.
const PERSIST_WAIT: Duration = Duration::from_secs(60 * 60);

/// Shared application state accessible by all Axum handlers. Live runs are
/// kept in an in-memory registry; finished runs are journaled to the store
/// so they stay queryable after the registry is gone.
pub struct AppState {
    pub env: Arc<AgentEnv>,
    pub runs: RwLock<HashMap<String, RunHandle>>,
    pub store: Mutex<RunStore>,
    pub provider_status: ProviderStatus,
    pub auth_token: Option<String>,
    /// Hard ceiling on the estimated token count of submitted content.
    pub max_input_tokens: Option<u32>,
}

/// Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(env: Arc<AgentEnv>, store: RunStore, provider_status: ProviderStatus) -> Self {
        Self {
            env,
            runs: RwLock::new(HashMap::new()),
            store: Mutex::new(store),
            provider_status,
            auth_token: None,
            max_input_tokens: None,
        }
    }
}

/// Register a started run: add it to the live registry and spawn a task
/// that journals the outcome once the run reaches a terminal status.
pub async fn track_run(state: &SharedState, handle: RunHandle) {
    state
        .runs
        .write()
        .await
        .insert(handle.info.wid.clone(), handle.clone());

    let state = Arc::clone(state);
    let started_at = Utc::now();
    tokio::spawn(async move {
        let outcome = handle.wait(PERSIST_WAIT).await;
        let finished_at = Utc::now();

        let record = match outcome {
            Ok(output) => RunRecord {
                wid: handle.info.wid.clone(),
                name: handle.info.name.clone(),
                status: RunStatus::Completed,
                started_at,
                finished_at,
                result: output.result,
                error: None,
            },
            Err(WorkflowError::ResultTimeout(after)) => {
                tracing::warn!(
                    wid = %handle.info.wid,
                    after = ?after,
                    "run still not finished, skipping journal entry"
                );
                return;
            }
            Err(err) => RunRecord {
                wid: handle.info.wid.clone(),
                name: handle.info.name.clone(),
                status: RunStatus::Failed,
                started_at,
                finished_at,
                result: None,
                error: Some(err.to_string()),
            },
        };

        if let Err(err) = state.store.lock().await.record(&record) {
            tracing::error!(wid = %record.wid, error = %err, "failed to journal run");
        }
    });
}

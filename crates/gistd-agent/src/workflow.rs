// ABOUTME: Workflow run execution: dynamic config overlays, retried activities,
// ABOUTME: queryable progress handles, heartbeats, and the all-types fan-out.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{RwLock, watch};
use ulid::Ulid;

use gistd_core::{
    AgentRunCost, AgentsConfig, AliasResolver, DynamicAgentConfig,
    InternalSummariesAllResult, InternalSummaryResult, ModelProvidersConfig, RunOutput,
    RunProgress, RunStatus, SummaryGrade, SummaryGradeCtx, SummaryInput, SummaryOutput,
    SummaryType, WorkflowInfo, WorkflowInput, WorkflowStepStatus,
};

use crate::client::ClientFactory;
use crate::error::AgentError;
use crate::resolver::resolve_config;
use crate::runner::{AgentDef, AgentRunner};
use crate::summarizer::refine::summarize_one_type;
use crate::summarizer::{
    KNOWN_AGENTS, SummaryAgent, SummaryJudgeAgent, SummaryPrettyAgent, SummaryPrettyJudgeAgent,
};

pub const WORKFLOW_ONE_TYPE: &str = "SummarizerOneType";
pub const WORKFLOW_ALL_TYPES: &str = "SummarizerAll";

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// Errors surfaced by the workflow layer.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("activity '{name}' failed: {source}")]
    Activity {
        name: String,
        #[source]
        source: AgentError,
    },

    #[error("activity '{name}' timed out after {after:?}")]
    ActivityTimeout { name: String, after: Duration },

    #[error("workflow did not complete within {0:?}")]
    ResultTimeout(Duration),

    #[error("workflow failed: {0}")]
    Failed(String),

    #[error("workflow finished without an outcome")]
    OutcomeMissing,
}

/// Bounded retry configuration for one activity.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub maximum_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Timeout and retry options applied to each unit of work.
#[derive(Debug, Clone, Copy)]
pub struct ActivityOptions {
    pub start_to_close: Duration,
    pub retry: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close: Duration::from_secs(5 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Run an activity with a per-attempt timeout and bounded retries.
/// Only retryable agent errors and timeouts consume extra attempts;
/// fatal errors return immediately.
pub async fn run_activity<T, F, Fut>(
    name: &str,
    opts: &ActivityOptions,
    mut make: F,
) -> Result<T, WorkflowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match tokio::time::timeout(opts.start_to_close, make()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if err.is_retryable() && attempt < opts.retry.maximum_attempts => {
                tracing::warn!(activity = name, attempt, error = %err, "activity failed, retrying");
                tokio::time::sleep(opts.retry.backoff).await;
            }
            Ok(Err(err)) => {
                return Err(WorkflowError::Activity {
                    name: name.to_string(),
                    source: err,
                });
            }
            Err(_) if attempt < opts.retry.maximum_attempts => {
                tracing::warn!(activity = name, attempt, "activity timed out, retrying");
            }
            Err(_) => {
                return Err(WorkflowError::ActivityTimeout {
                    name: name.to_string(),
                    after: opts.start_to_close,
                });
            }
        }
    }
}

/// Apply run-scoped overrides to a base agent configuration, returning a
/// new map and alias resolver. Nothing shared is mutated.
///
/// Precedence, most specific first: per-agent entry, global model
/// override, base configuration. Per-agent entries for agents already in
/// the base map override ONLY the model; entries for unknown agents become
/// full configs named after their key.
pub fn apply_dynamic_config(
    base: &AgentsConfig,
    dynamic: &DynamicAgentConfig,
    aliases: &AliasResolver,
) -> (AgentsConfig, AliasResolver) {
    let mut result = base.clone();

    let resolver = if dynamic.aliases.is_empty() {
        aliases.clone()
    } else {
        aliases.merged(&dynamic.aliases)
    };

    if let Some(model) = &dynamic.model {
        for patch in result.values_mut() {
            patch.model = Some(model.clone());
        }
    }

    for (name, patch) in &dynamic.agents {
        match result.get_mut(name) {
            Some(existing) => {
                if let Some(model) = &patch.model {
                    existing.model = Some(model.clone());
                }
            }
            None => {
                let mut entry = patch.clone();
                entry.name.get_or_insert_with(|| name.clone());
                result.insert(name.clone(), entry);
            }
        }
    }

    (result, resolver)
}

/// Process-wide agent environment: base configuration, provider table,
/// global aliases, and the client factory.
pub struct AgentEnv {
    pub agents: AgentsConfig,
    pub providers: ModelProvidersConfig,
    pub aliases: AliasResolver,
    pub factory: Arc<dyn ClientFactory>,
    pub activity: ActivityOptions,
}

impl AgentEnv {
    pub fn new(
        agents: AgentsConfig,
        providers: ModelProvidersConfig,
        aliases: AliasResolver,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            agents,
            providers,
            aliases,
            factory,
            activity: ActivityOptions::default(),
        }
    }

    /// Build the isolated configuration for one run. The base map is
    /// materialized for every known agent first, so a global model
    /// override reaches agents without a config-file entry.
    pub fn run_scoped(&self, dynamic: Option<&DynamicAgentConfig>) -> RunEnv {
        let mut agents = self.agents.clone();
        for name in KNOWN_AGENTS {
            agents.entry(name.to_string()).or_default();
        }

        let (agents, aliases) = match dynamic {
            Some(dynamic) if !dynamic.is_empty() => {
                apply_dynamic_config(&agents, dynamic, &self.aliases)
            }
            _ => (agents, self.aliases.clone()),
        };

        RunEnv {
            agents,
            providers: self.providers.clone(),
            aliases,
            factory: Arc::clone(&self.factory),
        }
    }
}

/// Per-run agent environment, isolated from the process-wide state.
#[derive(Clone)]
pub struct RunEnv {
    pub agents: AgentsConfig,
    pub providers: ModelProvidersConfig,
    pub aliases: AliasResolver,
    pub factory: Arc<dyn ClientFactory>,
}

impl RunEnv {
    /// Resolve configuration and build a runner for one agent definition.
    pub fn runner<C, O>(
        &self,
        def: Arc<dyn AgentDef<Context = C, Output = O>>,
    ) -> Result<AgentRunner<C, O>, AgentError>
    where
        C: serde::Serialize + Send + Sync,
        O: serde::de::DeserializeOwned + Send,
    {
        let default = def.default_config();
        let patch = self
            .agents
            .get(def.name_id())
            .filter(|p| !p.is_empty());
        let config = resolve_config(def.name_id(), &default, patch, &self.providers, &self.aliases)?;
        let client = self.factory.create(&config)?;
        Ok(AgentRunner::new(def, config, client))
    }

    /// The generator/judge pair for the requested summary type.
    #[allow(clippy::type_complexity)]
    pub fn summarizer_pair(
        &self,
        summary_type: SummaryType,
    ) -> Result<
        (
            AgentRunner<SummaryInput, SummaryOutput>,
            AgentRunner<SummaryGradeCtx, SummaryGrade>,
        ),
        AgentError,
    > {
        match summary_type {
            SummaryType::Pretty => Ok((
                self.runner(Arc::new(SummaryPrettyAgent))?,
                self.runner(Arc::new(SummaryPrettyJudgeAgent))?,
            )),
            SummaryType::Machine => Ok((
                self.runner(Arc::new(SummaryAgent))?,
                self.runner(Arc::new(SummaryJudgeAgent))?,
            )),
        }
    }
}

/// Generate a fresh workflow id with the given prefix.
pub fn new_workflow_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Ulid::new().to_string().to_lowercase())
}

/// Cloneable handle to a spawned workflow run: progress queries and
/// result waiting, mirroring an external runtime's workflow handle.
#[derive(Clone)]
pub struct RunHandle {
    pub info: WorkflowInfo,
    progress: Arc<RwLock<RunProgress>>,
    status_rx: watch::Receiver<RunStatus>,
    outcome: Arc<RwLock<Option<Result<RunOutput<Value>, String>>>>,
}

impl RunHandle {
    pub fn status(&self) -> RunStatus {
        *self.status_rx.borrow()
    }

    /// Snapshot of the run's step timeline, input, and result.
    pub async fn progress(&self) -> RunProgress {
        self.progress.read().await.clone()
    }

    /// The terminal outcome, if the run has finished.
    pub async fn outcome(&self) -> Option<Result<RunOutput<Value>, String>> {
        self.outcome.read().await.clone()
    }

    /// Wait for the run to finish, up to the given wall-clock timeout.
    pub async fn wait(&self, timeout: Duration) -> Result<RunOutput<Value>, WorkflowError> {
        let mut rx = self.status_rx.clone();
        let finished = tokio::time::timeout(timeout, async {
            loop {
                if rx.borrow_and_update().is_terminal() {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        if finished.is_err() {
            return Err(WorkflowError::ResultTimeout(timeout));
        }

        match self.outcome.read().await.clone() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(WorkflowError::Failed(message)),
            None => Err(WorkflowError::OutcomeMissing),
        }
    }
}

/// Writer side of a run's shared state, owned by the executor task.
struct RunState {
    info: WorkflowInfo,
    progress: Arc<RwLock<RunProgress>>,
    status_tx: watch::Sender<RunStatus>,
    outcome: Arc<RwLock<Option<Result<RunOutput<Value>, String>>>>,
}

impl RunState {
    fn new(info: WorkflowInfo, input: Option<Value>) -> (RunHandle, RunState) {
        let progress = Arc::new(RwLock::new(RunProgress {
            input,
            ..RunProgress::default()
        }));
        let outcome = Arc::new(RwLock::new(None));
        let (status_tx, status_rx) = watch::channel(RunStatus::Running);

        let handle = RunHandle {
            info: info.clone(),
            progress: Arc::clone(&progress),
            status_rx,
            outcome: Arc::clone(&outcome),
        };
        let state = RunState {
            info,
            progress,
            status_tx,
            outcome,
        };
        (handle, state)
    }

    async fn update_status(&self, step: &str, status: WorkflowStepStatus) {
        self.progress
            .write()
            .await
            .status_timeline
            .set(step, status);
    }

    async fn complete(&self, result: Value, cost: AgentRunCost) {
        self.progress.write().await.result = Some(result.clone());
        let output = RunOutput {
            result: Some(result),
            metadata: BTreeMap::new(),
            cost: Some(cost),
            workflow_info: Some(self.info.clone()),
        };
        *self.outcome.write().await = Some(Ok(output));
        let _ = self.status_tx.send(RunStatus::Completed);
    }

    async fn fail(&self, message: String) {
        tracing::error!(wid = %self.info.wid, error = %message, "workflow run failed");
        *self.outcome.write().await = Some(Err(message));
        let _ = self.status_tx.send(RunStatus::Failed);
    }
}

/// Background task that ticks a run's heartbeat timestamp while a
/// long-running activity executes. Aborted on drop.
struct HeartbeatGuard {
    task: tokio::task::JoinHandle<()>,
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn heartbeat_every(progress: Arc<RwLock<RunProgress>>, period: Duration) -> HeartbeatGuard {
    let task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            progress.write().await.last_heartbeat = Some(chrono::Utc::now());
        }
    });
    HeartbeatGuard { task }
}

fn fill_workflow_info(info: &mut WorkflowInfo, name: &str, prefix: &str) {
    if info.name.is_empty() {
        info.name = name.to_string();
    }
    if info.wid.is_empty() {
        info.wid = new_workflow_id(prefix);
    }
    if info.run_id.is_empty() {
        info.run_id = Ulid::new().to_string().to_lowercase();
    }
    if info.namespace.is_empty() {
        info.namespace = "default".to_string();
    }
}

/// Start a single-type summarization run. Returns immediately with a
/// handle; the refinement loop executes on a background task.
pub fn start_one_type(env: Arc<AgentEnv>, mut input: WorkflowInput<SummaryInput>) -> RunHandle {
    fill_workflow_info(&mut input.wid, WORKFLOW_ONE_TYPE, "summarizer-one-type");

    let input_json = serde_json::to_value(&input.agent_input.context).ok();
    let (handle, state) = RunState::new(input.wid.clone(), input_json);

    tokio::spawn(async move {
        state
            .update_status("Workflow Start", WorkflowStepStatus::Running)
            .await;
        let run_env = env.run_scoped(input.agent_config.as_ref());
        state
            .update_status("Input Processing", WorkflowStepStatus::Completed)
            .await;

        state
            .update_status("Summarizing Text", WorkflowStepStatus::Running)
            .await;
        let _heartbeat = heartbeat_every(Arc::clone(&state.progress), HEARTBEAT_PERIOD);

        let ctx = input.agent_input.context;
        let llm_input = input.agent_input.llm_input;
        let outcome = run_activity("summarize-one-type", &env.activity, || {
            let run_env = run_env.clone();
            let ctx = ctx.clone();
            let llm_input = llm_input.clone();
            async move { summarize_branch(&run_env, &llm_input, ctx).await }
        })
        .await;

        match outcome {
            Ok((result, cost)) => {
                state
                    .update_status("Summarizing Text", WorkflowStepStatus::Completed)
                    .await;
                state
                    .update_status("Workflow End", WorkflowStepStatus::Completed)
                    .await;
                match serde_json::to_value(&result) {
                    Ok(value) => state.complete(value, cost).await,
                    Err(e) => state.fail(format!("failed to encode result: {}", e)).await,
                }
            }
            Err(err) => {
                state
                    .update_status("Summarizing Text", WorkflowStepStatus::Failed)
                    .await;
                state
                    .update_status("Workflow End", WorkflowStepStatus::Failed)
                    .await;
                state.fail(err.to_string()).await;
            }
        }
    });

    handle
}

/// Start an all-types summarization run: one independent refinement loop
/// per summary type, joined at the end. A failed branch is logged and
/// excluded from the result set; the others proceed.
pub fn start_all_types(env: Arc<AgentEnv>, mut input: WorkflowInput<SummaryInput>) -> RunHandle {
    fill_workflow_info(&mut input.wid, WORKFLOW_ALL_TYPES, "summarizer-all");

    let input_json = serde_json::to_value(&input.agent_input.context).ok();
    let (handle, state) = RunState::new(input.wid.clone(), input_json);

    tokio::spawn(async move {
        state
            .update_status("Workflow Start", WorkflowStepStatus::Running)
            .await;
        let run_env = env.run_scoped(input.agent_config.as_ref());
        state
            .update_status("Input Processing", WorkflowStepStatus::Completed)
            .await;

        state
            .update_status("Summarizing Text (Multi)", WorkflowStepStatus::Running)
            .await;
        let _heartbeat = heartbeat_every(Arc::clone(&state.progress), HEARTBEAT_PERIOD);

        let ctx = input.agent_input.context;
        let llm_input = input.agent_input.llm_input;

        let branches = SummaryType::ALL.map(|summary_type| {
            // Each branch operates on its own copy of the input context.
            let mut branch_ctx = ctx.clone();
            branch_ctx.summary_type = summary_type;
            let run_env = run_env.clone();
            let llm_input = llm_input.clone();
            let env = Arc::clone(&env);
            async move {
                let name = format!("summarize-{}", summary_type);
                let outcome = run_activity(&name, &env.activity, || {
                    let run_env = run_env.clone();
                    let branch_ctx = branch_ctx.clone();
                    let llm_input = llm_input.clone();
                    async move { summarize_branch(&run_env, &llm_input, branch_ctx).await }
                })
                .await;
                (summary_type, outcome)
            }
        });

        let results = futures::future::join_all(branches).await;

        let mut summaries: BTreeMap<SummaryType, Option<InternalSummaryResult>> = BTreeMap::new();
        let mut cost = AgentRunCost::default();
        for (summary_type, outcome) in results {
            match outcome {
                Ok((result, branch_cost)) => {
                    cost.absorb(branch_cost);
                    summaries.insert(summary_type, Some(result));
                }
                Err(err) => {
                    tracing::error!(
                        summary_type = %summary_type,
                        error = %err,
                        "a summarization branch failed"
                    );
                }
            }
        }

        let result = InternalSummariesAllResult { summaries };
        state
            .update_status("Summarizing Text (Multi)", WorkflowStepStatus::Completed)
            .await;
        state
            .update_status("Workflow End", WorkflowStepStatus::Completed)
            .await;
        match serde_json::to_value(&result) {
            Ok(value) => state.complete(value, cost).await,
            Err(e) => state.fail(format!("failed to encode result: {}", e)).await,
        }
    });

    handle
}

/// One refinement loop plus cost collection, shared by both workflows.
async fn summarize_branch(
    run_env: &RunEnv,
    llm_input: &str,
    ctx: SummaryInput,
) -> Result<(InternalSummaryResult, AgentRunCost), AgentError> {
    let (generator, judge) = run_env.summarizer_pair(ctx.summary_type)?;
    let result = summarize_one_type(&generator, &judge, llm_input, ctx).await?;
    let mut cost = generator.cost();
    cost.absorb(judge.cost());
    Ok((result, cost))
}

// ABOUTME: Agent configuration records, provider mapping tables, and workflow IO envelopes.
// ABOUTME: Configuration merging follows template -> provider mapping -> explicit override precedence.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::visibility::WorkflowInfo;

/// Which LLM client implementation an agent talks through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Openai,
    Gemini,
    #[default]
    Litellm,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientKind::Openai => "openai",
            ClientKind::Gemini => "gemini",
            ClientKind::Litellm => "litellm",
        };
        f.write_str(s)
    }
}

/// Which API surface the client uses for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    #[default]
    Chat,
    Response,
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApiMode::Chat => "chat",
            ApiMode::Response => "response",
        };
        f.write_str(s)
    }
}

/// Provider-dependent settings applied when no explicit override is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub client: ClientKind,
    #[serde(default)]
    pub api_mode: ApiMode,
}

/// Maps a model-name prefix (e.g. "gpt-", "gemini/") to provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMapping {
    pub prefix: String,
    pub client: ClientKind,
    pub api_mode: ApiMode,
}

/// Prefix-to-provider lookup table. Matching is deterministic: the first
/// mapping whose prefix matches wins, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProvidersConfig {
    #[serde(default)]
    pub default: ProviderSettings,
    #[serde(default)]
    pub mappings: Vec<ProviderMapping>,
}

impl ModelProvidersConfig {
    /// Find the first mapping whose prefix matches the model name.
    /// No longest-prefix tie-break: declaration order decides.
    pub fn find_mapping(&self, model: &str) -> Option<&ProviderMapping> {
        self.mappings.iter().find(|m| model.starts_with(&m.prefix))
    }
}

/// Sampling and generation knobs forwarded to the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// A fully resolved agent configuration. Produced by merging a default
/// template with override fields; the template itself is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model: String,
    #[serde(default)]
    pub client: ClientKind,
    #[serde(default)]
    pub api_mode: ApiMode,
    #[serde(default)]
    pub model_settings: ModelSettings,
    #[serde(default)]
    pub max_input_tokens: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Partial agent configuration: every field optional, so "explicitly set
/// by the caller" and "left at the template default" stay distinguishable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_mode: Option<ApiMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_settings: Option<ModelSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl AgentConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-agent configuration overrides keyed by agent name id, as loaded
/// from the config file.
pub type AgentsConfig = BTreeMap<String, AgentConfigPatch>;

/// Runtime configuration overrides supplied with a single workflow run.
/// Never mutates shared state: merges are applied to fresh copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicAgentConfig {
    /// Global model override, applied to every agent unless a per-agent
    /// entry overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Alias mappings merged over the global alias table for this run.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Per-agent overrides keyed by agent name id.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfigPatch>,
}

impl DynamicAgentConfig {
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.aliases.is_empty() && self.agents.is_empty()
    }
}

/// The agent's input data: a typed context plus an optional free-form
/// instruction appended to the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput<T> {
    pub context: T,
    #[serde(default, alias = "input")]
    pub llm_input: String,
}

impl<T> AgentInput<T> {
    pub fn new(context: T) -> Self {
        Self {
            context,
            llm_input: String::new(),
        }
    }
}

/// Envelope submitted to a workflow run: agent input, optional runtime
/// configuration overrides, and workflow identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInput<T> {
    pub agent_input: AgentInput<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_config: Option<DynamicAgentConfig>,
    #[serde(default)]
    pub wid: WorkflowInfo,
}

impl<T> WorkflowInput<T> {
    pub fn new(agent_input: AgentInput<T>) -> Self {
        Self {
            agent_input,
            agent_config: None,
            wid: WorkflowInfo::default(),
        }
    }
}

/// Aggregate resource usage of one workflow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRunCost {
    pub total_tokens: u64,
    /// Wall-clock seconds spent in agent calls.
    pub total_time: f64,
    pub total_cost: f64,
}

impl AgentRunCost {
    pub fn absorb(&mut self, other: AgentRunCost) {
        self.total_tokens += other.total_tokens;
        self.total_time += other.total_time;
        self.total_cost += other.total_cost;
    }
}

/// Final output envelope of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<AgentRunCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_info: Option<WorkflowInfo>,
}

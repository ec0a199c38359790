// ABOUTME: Core library for gistd, containing the shared domain model.
// ABOUTME: Summary types, agent configuration, aliases, chat messages, and run visibility.

pub mod agent;
pub mod aliases;
pub mod message;
pub mod summary;
pub mod tokens;
pub mod visibility;

pub use agent::{
    AgentConfig, AgentConfigPatch, AgentInput, AgentRunCost, AgentsConfig, ApiMode, ClientKind,
    DynamicAgentConfig, ModelProvidersConfig, ModelSettings, ProviderMapping, ProviderSettings,
    RunOutput, WorkflowInput,
};
pub use aliases::AliasResolver;
pub use message::{ChatMessage, Role, filter_empty_messages};
pub use summary::{
    Entity, InternalSummariesAllResult, InternalSummaryResult, SummariesResult, SummaryGrade,
    SummaryGradeCtx, SummaryInput, SummaryOutput, SummaryType,
};
pub use tokens::{estimate_message_tokens, estimate_tokens};
pub use visibility::{RunProgress, RunStatus, StatusTimeline, WorkflowInfo, WorkflowStepStatus};

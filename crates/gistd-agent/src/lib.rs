// ABOUTME: Agent runtime for gistd: LLM clients, configuration resolution, and workflow runs.
// ABOUTME: Providers adapt per-API wire formats; the workflow module tracks run progress and retries.

pub mod client;
pub mod error;
pub mod providers;
pub mod resolver;
pub mod runner;
pub mod summarizer;
pub mod testing;
pub mod workflow;

pub use client::{
    ClientFactory, CompletionRequest, CompletionResponse, HttpClientFactory, LlmClient,
    LlmCredentials, ProviderCredentials,
};
pub use error::AgentError;
pub use resolver::resolve_config;
pub use runner::{AgentDef, AgentRunner};
pub use summarizer::refine::summarize_one_type;
pub use workflow::{
    ActivityOptions, AgentEnv, RetryPolicy, RunEnv, RunHandle, WorkflowError, apply_dynamic_config,
    start_all_types, start_one_type,
};

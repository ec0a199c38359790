// ABOUTME: Error types for agent execution and configuration resolution.
// ABOUTME: Distinguishes retryable provider failures from fatal configuration and size errors.

use thiserror::Error;

/// Errors that can occur while resolving configuration or running an agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("input too large: {tokens} tokens exceeds limit of {limit}")]
    ContextTooLarge { tokens: u32, limit: u32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no summaries generated")]
    NoResult,
}

impl AgentError {
    /// Whether the workflow layer should retry the failed activity.
    /// Size, configuration, and no-result errors are fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::Provider(_) | AgentError::InvalidResponse(_) | AgentError::RateLimited
        )
    }
}

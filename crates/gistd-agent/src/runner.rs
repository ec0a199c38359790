// ABOUTME: AgentDef trait and AgentRunner: prompt assembly, input hygiene,
// ABOUTME: token-ceiling checks, and structured JSON output parsing.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;

use gistd_core::{
    AgentConfig, AgentRunCost, ChatMessage, estimate_message_tokens, filter_empty_messages,
};

use crate::client::{CompletionRequest, LlmClient};
use crate::error::AgentError;

/// Definition of one agent: its identity, default configuration, system
/// prompt, and how a typed context becomes chat messages.
pub trait AgentDef: Send + Sync {
    type Context: Serialize + Send + Sync;
    type Output: DeserializeOwned + Send;

    fn name_id(&self) -> &'static str;
    fn default_config(&self) -> AgentConfig;
    fn system_prompt(&self) -> String;
    fn build_messages(&self, ctx: &Self::Context) -> Vec<ChatMessage>;
}

/// Executes an agent definition against a resolved configuration and client.
/// Tracks token and wall-clock cost across calls.
pub struct AgentRunner<C, O> {
    def: Arc<dyn AgentDef<Context = C, Output = O>>,
    pub config: AgentConfig,
    client: Arc<dyn LlmClient>,
    cost: Mutex<AgentRunCost>,
}

impl<C, O> AgentRunner<C, O>
where
    C: Serialize + Send + Sync,
    O: DeserializeOwned + Send,
{
    pub fn new(
        def: Arc<dyn AgentDef<Context = C, Output = O>>,
        config: AgentConfig,
        client: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            def,
            config,
            client,
            cost: Mutex::new(AgentRunCost::default()),
        }
    }

    pub fn name_id(&self) -> &'static str {
        self.def.name_id()
    }

    /// Run the agent once. Returns `Ok(None)` when the provider answered
    /// but the output did not parse into the expected structure; callers
    /// decide whether to retry the slot or stop.
    pub async fn run(&self, llm_input: &str, ctx: &C) -> Result<Option<O>, AgentError> {
        let mut messages = vec![ChatMessage::system(self.def.system_prompt())];
        messages.extend(self.def.build_messages(ctx));
        if !llm_input.is_empty() {
            messages.push(ChatMessage::user(llm_input));
        }

        let messages = filter_empty_messages(self.def.name_id(), messages);

        if let Some(limit) = self.config.max_input_tokens {
            let tokens = estimate_message_tokens(&messages);
            if tokens > limit {
                return Err(AgentError::ContextTooLarge { tokens, limit });
            }
        }

        let started = Instant::now();
        let response = self
            .client
            .complete(CompletionRequest {
                model: self.config.model.clone(),
                messages,
                settings: self.config.model_settings.clone(),
                json_output: true,
            })
            .await?;

        {
            let mut cost = self.cost.lock().unwrap_or_else(|e| e.into_inner());
            cost.total_tokens += response.total_tokens;
            cost.total_time += started.elapsed().as_secs_f64();
        }

        match parse_structured::<O>(&response.text) {
            Ok(output) => Ok(Some(output)),
            Err(e) => {
                tracing::warn!(
                    agent = self.def.name_id(),
                    error = %e,
                    "discarding unparseable agent output"
                );
                Ok(None)
            }
        }
    }

    /// Accumulated cost of every call made through this runner.
    pub fn cost(&self) -> AgentRunCost {
        *self.cost.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse a structured JSON output, tolerating markdown code fences and
/// surrounding prose. Tries the raw text, then the fenced block, then the
/// outermost brace span.
pub(crate) fn parse_structured<O: DeserializeOwned>(text: &str) -> Result<O, serde_json::Error> {
    let trimmed = text.trim();

    match serde_json::from_str(trimmed) {
        Ok(output) => return Ok(output),
        Err(first_err) => {
            if let Some(inner) = strip_code_fence(trimmed)
                && let Ok(output) = serde_json::from_str(inner)
            {
                return Ok(output);
            }
            if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
                && start < end
                && let Ok(output) = serde_json::from_str(&trimmed[start..=end])
            {
                return Ok(output);
            }
            Err(first_err)
        }
    }
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```")?;
    Some(rest.trim())
}

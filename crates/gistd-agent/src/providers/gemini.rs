// ABOUTME: Gemini adapter implementing the LlmClient trait.
// ABOUTME: Talks to Gemini's OpenAI-compatible chat endpoint; strips the "gemini/" routing prefix.

use async_trait::async_trait;

use gistd_core::ClientKind;

use crate::client::{CompletionRequest, CompletionResponse, LlmClient};
use crate::error::AgentError;
use crate::providers::{build_chat_body, parse_chat_response, post_json};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Gemini adapter using the OpenAI-compatibility surface, so the shared
/// chat body builder applies unchanged.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Model names arrive in routed form ("gemini/gemini-pro"); the native
    /// endpoint wants the bare model id.
    pub fn normalize_model(model: &str) -> &str {
        model.strip_prefix("gemini/").unwrap_or(model)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AgentError> {
        let model = Self::normalize_model(&request.model).to_string();
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = build_chat_body(&model, &request);
        let response = post_json(&self.client, &url, &self.api_key, &body).await?;
        parse_chat_response(&response)
    }

    fn client_kind(&self) -> ClientKind {
        ClientKind::Gemini
    }
}

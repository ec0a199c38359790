// ABOUTME: LiteLLM proxy adapter implementing the LlmClient trait.
// ABOUTME: OpenAI-compatible chat completions against a configured proxy; model names pass through.

use async_trait::async_trait;

use gistd_core::ClientKind;

use crate::client::{CompletionRequest, CompletionResponse, LlmClient};
use crate::error::AgentError;
use crate::providers::{build_chat_body, parse_chat_response, post_json};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4000";

/// LiteLLM proxy adapter. Routed model names like "gemini/gemini-pro" are
/// forwarded untouched; the proxy does its own provider routing.
pub struct LiteLlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl LiteLlmClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl LlmClient for LiteLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AgentError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = build_chat_body(&request.model, &request);
        let response = post_json(&self.client, &url, &self.api_key, &body).await?;
        parse_chat_response(&response)
    }

    fn client_kind(&self) -> ClientKind {
        ClientKind::Litellm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_points_at_local_proxy() {
        let client = LiteLlmClient::new("k".to_string(), None);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.client_kind(), ClientKind::Litellm);
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let client = LiteLlmClient::new("k".to_string(), Some("http://proxy:4000/".to_string()));
        let url = format!("{}/v1/chat/completions", client.base_url.trim_end_matches('/'));
        assert_eq!(url, "http://proxy:4000/v1/chat/completions");
    }
}

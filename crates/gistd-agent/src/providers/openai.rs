// ABOUTME: OpenAI API adapter implementing the LlmClient trait.
// ABOUTME: Supports both the Chat Completions and the Responses API surfaces.

use async_trait::async_trait;
use serde_json::{Value, json};

use gistd_core::{ApiMode, ClientKind};

use crate::client::{CompletionRequest, CompletionResponse, LlmClient};
use crate::error::AgentError;
use crate::providers::{build_chat_body, parse_chat_response, post_json};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI adapter. The api_mode decides between `/v1/chat/completions`
/// and `/v1/responses`.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    api_mode: ApiMode,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<String>, api_mode: ApiMode) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_mode,
        }
    }

    /// Build the JSON request body for the Responses API.
    pub fn build_responses_body(request: &CompletionRequest) -> Value {
        let input: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": request.model,
            "input": input,
        });

        if let Some(temperature) = request.settings.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.settings.max_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = request.settings.top_p {
            body["top_p"] = json!(top_p);
        }
        if request.json_output {
            body["text"] = json!({ "format": { "type": "json_object" } });
        }

        body
    }

    /// Parse a Responses API body: the first `output_text` block of the
    /// first message item.
    pub fn parse_responses_body(body: &Value) -> Result<CompletionResponse, AgentError> {
        let output = body
            .get("output")
            .and_then(|o| o.as_array())
            .ok_or_else(|| AgentError::InvalidResponse("missing output array".to_string()))?;

        let mut text = None;
        for item in output {
            if item.get("type").and_then(|t| t.as_str()) != Some("message") {
                continue;
            }
            let blocks = item
                .get("content")
                .and_then(|c| c.as_array())
                .cloned()
                .unwrap_or_default();
            for block in blocks {
                if block.get("type").and_then(|t| t.as_str()) == Some("output_text")
                    && let Some(t) = block.get("text").and_then(|t| t.as_str())
                {
                    text = Some(t.to_string());
                    break;
                }
            }
            if text.is_some() {
                break;
            }
        }

        let text = text
            .ok_or_else(|| AgentError::InvalidResponse("no output_text in response".to_string()))?;

        let total_tokens = body
            .pointer("/usage/total_tokens")
            .and_then(|t| t.as_u64())
            .unwrap_or(0);

        Ok(CompletionResponse { text, total_tokens })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AgentError> {
        match self.api_mode {
            ApiMode::Chat => {
                let url = format!("{}/v1/chat/completions", self.base_url);
                let body = build_chat_body(&request.model, &request);
                let response = post_json(&self.client, &url, &self.api_key, &body).await?;
                parse_chat_response(&response)
            }
            ApiMode::Response => {
                let url = format!("{}/v1/responses", self.base_url);
                let body = Self::build_responses_body(&request);
                let response = post_json(&self.client, &url, &self.api_key, &body).await?;
                Self::parse_responses_body(&response)
            }
        }
    }

    fn client_kind(&self) -> ClientKind {
        ClientKind::Openai
    }
}

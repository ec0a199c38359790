// ABOUTME: Provider module aggregating all LLM API adapters.
// ABOUTME: Shared helpers for OpenAI-compatible chat bodies and HTTP status mapping.

pub mod gemini;
pub mod litellm;
pub mod openai;

use serde_json::{Value, json};

use crate::client::{CompletionRequest, CompletionResponse};
use crate::error::AgentError;

/// Build an OpenAI-compatible chat completions request body.
/// Shared across adapters: OpenAI chat mode, Gemini's compatibility
/// endpoint, and the LiteLLM proxy all accept this shape.
pub(crate) fn build_chat_body(model: &str, request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
        .collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
    });

    if let Some(temperature) = request.settings.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.settings.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(top_p) = request.settings.top_p {
        body["top_p"] = json!(top_p);
    }
    if request.json_output {
        body["response_format"] = json!({ "type": "json_object" });
    }

    body
}

/// Parse an OpenAI-compatible chat completions response.
pub(crate) fn parse_chat_response(body: &Value) -> Result<CompletionResponse, AgentError> {
    let choices = body
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| AgentError::InvalidResponse("missing choices array".to_string()))?;

    let message = choices
        .first()
        .and_then(|c| c.get("message"))
        .ok_or_else(|| AgentError::InvalidResponse("empty choices array".to_string()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| AgentError::InvalidResponse("missing message content".to_string()))?
        .to_string();

    let total_tokens = body
        .pointer("/usage/total_tokens")
        .and_then(|t| t.as_u64())
        .unwrap_or(0);

    Ok(CompletionResponse { text, total_tokens })
}

/// POST a JSON body with bearer auth, mapping HTTP failures to AgentError.
/// 429 becomes RateLimited, 401 a key hint, 5xx a server error; any other
/// non-success carries the response body for diagnosis.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &Value,
) -> Result<Value, AgentError> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| AgentError::Provider(format!("HTTP request failed: {}", e)))?;

    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AgentError::RateLimited);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(AgentError::Provider(
            "unauthorized: check the provider API key".to_string(),
        ));
    }

    if status.is_server_error() {
        return Err(AgentError::Provider(format!("server error: {}", status)));
    }

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(AgentError::Provider(format!(
            "API error {}: {}",
            status, error_body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AgentError::InvalidResponse(format!("failed to parse JSON: {}", e)))
}

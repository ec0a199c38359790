// ABOUTME: LlmClient trait, completion request/response types, and client construction.
// ABOUTME: The factory maps a resolved AgentConfig to a concrete provider adapter.

use std::sync::Arc;

use async_trait::async_trait;

use gistd_core::{AgentConfig, ApiMode, ChatMessage, ClientKind, ModelSettings};

use crate::error::AgentError;
use crate::providers::gemini::GeminiClient;
use crate::providers::litellm::LiteLlmClient;
use crate::providers::openai::OpenAiClient;

/// A single completion request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub settings: ModelSettings,
    /// Ask the provider for a JSON object response.
    pub json_output: bool,
}

/// The provider's answer: raw text plus token usage.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub total_tokens: u64,
}

/// Trait implemented by every LLM provider adapter.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Execute one completion call.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AgentError>;

    /// Which client family this adapter belongs to, for logging.
    fn client_kind(&self) -> ClientKind;
}

/// Credentials for one provider, from config file or environment.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Credentials for all supported providers.
#[derive(Debug, Clone, Default)]
pub struct LlmCredentials {
    pub openai: ProviderCredentials,
    pub gemini: ProviderCredentials,
    pub litellm: ProviderCredentials,
}

impl LlmCredentials {
    /// Read credentials from environment variables:
    /// `OPENAI_API_KEY`/`OPENAI_BASE_URL`, `GEMINI_API_KEY`/`GEMINI_BASE_URL`,
    /// `LITELLM_API_KEY`/`LITELLM_BASE_URL`.
    pub fn from_env() -> Self {
        fn read(key_var: &str, url_var: &str) -> ProviderCredentials {
            ProviderCredentials {
                api_key: std::env::var(key_var).ok().filter(|v| !v.is_empty()),
                base_url: std::env::var(url_var).ok().filter(|v| !v.is_empty()),
            }
        }

        Self {
            openai: read("OPENAI_API_KEY", "OPENAI_BASE_URL"),
            gemini: read("GEMINI_API_KEY", "GEMINI_BASE_URL"),
            litellm: read("LITELLM_API_KEY", "LITELLM_BASE_URL"),
        }
    }

    pub fn for_kind(&self, kind: ClientKind) -> &ProviderCredentials {
        match kind {
            ClientKind::Openai => &self.openai,
            ClientKind::Gemini => &self.gemini,
            ClientKind::Litellm => &self.litellm,
        }
    }
}

/// Builds an LlmClient for a resolved agent configuration. Swappable so
/// tests can inject scripted clients.
pub trait ClientFactory: Send + Sync {
    fn create(&self, config: &AgentConfig) -> Result<Arc<dyn LlmClient>, AgentError>;
}

/// Production factory: picks the reqwest-backed adapter matching the
/// config's client kind. Per-config `api_key`/`base_url` win over the
/// configured credentials.
pub struct HttpClientFactory {
    credentials: LlmCredentials,
}

impl HttpClientFactory {
    pub fn new(credentials: LlmCredentials) -> Self {
        Self { credentials }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self, config: &AgentConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
        let creds = self.credentials.for_kind(config.client);
        let api_key = config
            .api_key
            .clone()
            .or_else(|| creds.api_key.clone())
            .ok_or_else(|| {
                AgentError::Config(format!("no api key configured for client '{}'", config.client))
            })?;
        let base_url = config.base_url.clone().or_else(|| creds.base_url.clone());

        let client: Arc<dyn LlmClient> = match config.client {
            ClientKind::Openai => Arc::new(OpenAiClient::new(api_key, base_url, config.api_mode)),
            ClientKind::Gemini => Arc::new(GeminiClient::new(api_key, base_url)),
            ClientKind::Litellm => Arc::new(LiteLlmClient::new(api_key, base_url)),
        };
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: ClientKind, api_key: Option<&str>) -> AgentConfig {
        AgentConfig {
            name: "Test".to_string(),
            description: String::new(),
            model: "gpt-4o".to_string(),
            client: kind,
            api_mode: ApiMode::Chat,
            model_settings: ModelSettings::default(),
            max_input_tokens: None,
            base_url: None,
            api_key: api_key.map(String::from),
        }
    }

    #[test]
    fn factory_requires_api_key() {
        let factory = HttpClientFactory::new(LlmCredentials::default());
        let err = match factory.create(&config(ClientKind::Openai, None)) {
            Err(e) => e,
            Ok(_) => panic!("expected factory.create to fail without an api key"),
        };
        assert!(matches!(err, AgentError::Config(_)));
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn factory_uses_per_config_key() {
        let factory = HttpClientFactory::new(LlmCredentials::default());
        let client = factory
            .create(&config(ClientKind::Litellm, Some("sk-test")))
            .unwrap();
        assert_eq!(client.client_kind(), ClientKind::Litellm);
    }

    #[test]
    fn factory_falls_back_to_credentials() {
        let credentials = LlmCredentials {
            gemini: ProviderCredentials {
                api_key: Some("g-key".to_string()),
                base_url: None,
            },
            ..LlmCredentials::default()
        };
        let factory = HttpClientFactory::new(credentials);
        let client = factory.create(&config(ClientKind::Gemini, None)).unwrap();
        assert_eq!(client.client_kind(), ClientKind::Gemini);
    }
}

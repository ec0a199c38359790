// ABOUTME: LLM provider status reporting for the gistd API.
// ABOUTME: Derived from loaded credentials; key values are never exposed.

use serde::Serialize;

use gistd_agent::{LlmCredentials, ProviderCredentials};

/// Status of a single LLM provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub has_api_key: bool,
    pub base_url: Option<String>,
}

/// Redacted provider overview served by `GET /api/providers`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub providers: Vec<ProviderInfo>,
    pub any_available: bool,
}

impl ProviderStatus {
    /// Report which providers have credentials configured.
    pub fn from_credentials(credentials: &LlmCredentials) -> Self {
        let providers = vec![
            entry("openai", &credentials.openai),
            entry("gemini", &credentials.gemini),
            entry("litellm", &credentials.litellm),
        ];
        let any_available = providers.iter().any(|p| p.has_api_key);

        Self {
            providers,
            any_available,
        }
    }
}

fn entry(name: &str, credentials: &ProviderCredentials) -> ProviderInfo {
    ProviderInfo {
        name: name.to_string(),
        has_api_key: credentials
            .api_key
            .as_ref()
            .is_some_and(|k| !k.is_empty()),
        base_url: credentials.base_url.clone(),
    }
}

// ABOUTME: Configuration loading and validation for the gistd server.
// ABOUTME: Merges an optional YAML config file with environment variables; env wins.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use gistd_agent::{LlmCredentials, ProviderCredentials};
use gistd_core::{AgentsConfig, ModelProvidersConfig};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GISTD_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("GISTD_MAX_INPUT_TOKENS is not a number: {0}")]
    InvalidMaxTokens(String),

    #[error(
        "GISTD_ALLOW_REMOTE is true but GISTD_AUTH_TOKEN is not set; refusing to start without authentication"
    )]
    RemoteWithoutToken,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// One provider's credentials as written in the YAML `llms` section.
#[derive(Debug, Clone, Default, Deserialize)]
struct CredentialEntry {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    openai: CredentialEntry,
    #[serde(default)]
    gemini: CredentialEntry,
    #[serde(default)]
    litellm: CredentialEntry,
}

/// Shape of the YAML configuration file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    agents: AgentsConfig,
    #[serde(default)]
    providers: ModelProvidersConfig,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(default)]
    llms: CredentialsFile,
}

/// Server configuration: process settings from the environment plus agent,
/// provider, and alias tables from the YAML file.
#[derive(Debug, Clone)]
pub struct GistdConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub allow_remote: bool,
    pub auth_token: Option<String>,
    /// Hard ceiling on the estimated token count of submitted content.
    pub max_input_tokens: Option<u32>,
    pub agents: AgentsConfig,
    pub providers: ModelProvidersConfig,
    pub aliases: BTreeMap<String, String>,
    pub credentials: LlmCredentials,
}

impl GistdConfig {
    /// Load configuration from `GISTD_CONFIG` (if set) and the environment.
    ///
    /// Environment variables:
    /// - GISTD_HOME: data directory (default: ~/.gistd)
    /// - GISTD_BIND: socket address to bind (default: 127.0.0.1:7878)
    /// - GISTD_ALLOW_REMOTE: allow non-loopback connections (default: false)
    /// - GISTD_AUTH_TOKEN: bearer token for API auth (optional)
    /// - GISTD_MAX_INPUT_TOKENS: input-size ceiling in tokens (optional)
    /// - GISTD_CONFIG: path to the YAML config file (optional)
    /// - OPENAI_API_KEY / GEMINI_API_KEY / LITELLM_API_KEY and the matching
    ///   *_BASE_URL variables, overriding the file's `llms` section
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GISTD_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self::load_with(path.as_deref())
    }

    /// Load from an explicit YAML file path plus the environment.
    /// Environment values win over file values.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_yaml::from_str::<ConfigFile>(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => ConfigFile::default(),
        };

        let home = std::env::var("GISTD_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".gistd")
            });

        let bind_str =
            std::env::var("GISTD_BIND").unwrap_or_else(|_| "127.0.0.1:7878".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let allow_remote = std::env::var("GISTD_ALLOW_REMOTE")
            .map(|v| v == "true" || v == "1" || v == "yes")
            .unwrap_or(false);

        let auth_token = std::env::var("GISTD_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let max_input_tokens = match std::env::var("GISTD_MAX_INPUT_TOKENS") {
            Ok(raw) if !raw.is_empty() => Some(
                raw.parse::<u32>()
                    .map_err(|_| ConfigError::InvalidMaxTokens(raw))?,
            ),
            _ => None,
        };

        if allow_remote && auth_token.is_none() {
            return Err(ConfigError::RemoteWithoutToken);
        }

        let env_creds = LlmCredentials::from_env();
        let credentials = LlmCredentials {
            openai: merge_credentials(env_creds.openai, file.llms.openai),
            gemini: merge_credentials(env_creds.gemini, file.llms.gemini),
            litellm: merge_credentials(env_creds.litellm, file.llms.litellm),
        };

        Ok(Self {
            home,
            bind,
            allow_remote,
            auth_token,
            max_input_tokens,
            agents: file.agents,
            providers: file.providers,
            aliases: file.aliases,
            credentials,
        })
    }
}

fn merge_credentials(env: ProviderCredentials, file: CredentialEntry) -> ProviderCredentials {
    ProviderCredentials {
        api_key: env.api_key.or(file.api_key),
        base_url: env.base_url.or(file.base_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gistd_core::ClientKind;
    use std::io::Write;
    use std::sync::Mutex;

    /// Serializes tests that manipulate process-wide environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: only call while holding ENV_MUTEX.
    unsafe fn clear_gistd_env() {
        // SAFETY: caller holds ENV_MUTEX, no concurrent env var access
        unsafe {
            std::env::remove_var("GISTD_HOME");
            std::env::remove_var("GISTD_BIND");
            std::env::remove_var("GISTD_ALLOW_REMOTE");
            std::env::remove_var("GISTD_AUTH_TOKEN");
            std::env::remove_var("GISTD_MAX_INPUT_TOKENS");
            std::env::remove_var("OPENAI_API_KEY");
            std::env::remove_var("OPENAI_BASE_URL");
            std::env::remove_var("GEMINI_API_KEY");
            std::env::remove_var("GEMINI_BASE_URL");
            std::env::remove_var("LITELLM_API_KEY");
            std::env::remove_var("LITELLM_BASE_URL");
        }
    }

    #[test]
    fn loads_defaults_without_file_or_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: holding ENV_MUTEX
        unsafe {
            clear_gistd_env();
        }

        let config = GistdConfig::load_with(None).unwrap();

        assert_eq!(config.bind, "127.0.0.1:7878".parse::<SocketAddr>().unwrap());
        assert!(!config.allow_remote);
        assert!(config.auth_token.is_none());
        assert!(config.max_input_tokens.is_none());
        assert!(config.home.to_string_lossy().contains(".gistd"));
        assert!(config.agents.is_empty());
        assert!(config.providers.mappings.is_empty());
    }

    #[test]
    fn rejects_remote_without_token() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: holding ENV_MUTEX
        unsafe {
            clear_gistd_env();
            std::env::set_var("GISTD_ALLOW_REMOTE", "true");
        }

        let result = GistdConfig::load_with(None);

        // SAFETY: holding ENV_MUTEX
        unsafe {
            std::env::remove_var("GISTD_ALLOW_REMOTE");
        }

        assert!(matches!(result, Err(ConfigError::RemoteWithoutToken)));
    }

    #[test]
    fn rejects_invalid_bind_address() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: holding ENV_MUTEX
        unsafe {
            clear_gistd_env();
            std::env::set_var("GISTD_BIND", "not-an-address");
        }

        let result = GistdConfig::load_with(None);

        // SAFETY: holding ENV_MUTEX
        unsafe {
            std::env::remove_var("GISTD_BIND");
        }

        assert!(matches!(result, Err(ConfigError::InvalidBind(_))));
    }

    #[test]
    fn rejects_non_numeric_token_ceiling() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: holding ENV_MUTEX
        unsafe {
            clear_gistd_env();
            std::env::set_var("GISTD_MAX_INPUT_TOKENS", "lots");
        }

        let result = GistdConfig::load_with(None);

        // SAFETY: holding ENV_MUTEX
        unsafe {
            std::env::remove_var("GISTD_MAX_INPUT_TOKENS");
        }

        assert!(matches!(result, Err(ConfigError::InvalidMaxTokens(_))));
    }

    #[test]
    fn reads_tables_from_yaml_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: holding ENV_MUTEX
        unsafe {
            clear_gistd_env();
        }

        let yaml = r#"
agents:
  SummaryAgent:
    model: gpt-4o
    max_input_tokens: 100000
providers:
  default:
    client: litellm
    api_mode: chat
  mappings:
    - prefix: "gpt-"
      client: openai
      api_mode: response
aliases:
  fast: gpt-4o-mini
llms:
  litellm:
    base_url: http://localhost:4000
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = GistdConfig::load_with(Some(file.path())).unwrap();

        assert_eq!(
            config.agents["SummaryAgent"].model.as_deref(),
            Some("gpt-4o")
        );
        assert_eq!(config.agents["SummaryAgent"].max_input_tokens, Some(100_000));
        assert_eq!(config.providers.mappings.len(), 1);
        assert_eq!(config.providers.mappings[0].client, ClientKind::Openai);
        assert_eq!(config.aliases["fast"], "gpt-4o-mini");
        assert_eq!(
            config.credentials.litellm.base_url.as_deref(),
            Some("http://localhost:4000")
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = GistdConfig::load_with(Some(Path::new("/nonexistent/gistd.yaml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}

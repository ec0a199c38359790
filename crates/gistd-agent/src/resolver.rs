// ABOUTME: Agent configuration resolution: default template, alias substitution,
// ABOUTME: prefix-mapped provider settings, and explicit caller overrides, in that precedence.

use gistd_core::{AgentConfig, AgentConfigPatch, AliasResolver, ModelProvidersConfig};

use crate::error::AgentError;

/// Resolve the final configuration for one agent.
///
/// Precedence per field:
/// 1. explicit patch value (the caller set it)
/// 2. for `client`/`api_mode`: the first provider mapping whose prefix
///    matches the resolved model name, else the table's declared default
/// 3. the agent's default template
///
/// The template is never mutated; every call returns a fresh record.
pub fn resolve_config(
    agent: &str,
    default: &AgentConfig,
    patch: Option<&AgentConfigPatch>,
    providers: &ModelProvidersConfig,
    aliases: &AliasResolver,
) -> Result<AgentConfig, AgentError> {
    let empty = AgentConfigPatch::default();
    let patch = patch.unwrap_or(&empty);

    let mut resolved = default.clone();

    // Model name: explicit override beats the template, then aliases apply.
    let requested = patch
        .model
        .clone()
        .unwrap_or_else(|| resolved.model.clone());
    let model = aliases.resolve(&requested);
    if model != requested {
        tracing::info!(agent, from = %requested, to = %model, "model alias resolved");
    }
    if model.trim().is_empty() {
        return Err(AgentError::Config(format!(
            "agent '{}' resolved to an empty model name",
            agent
        )));
    }
    resolved.model = model;

    // Provider-dependent settings. An explicit override always wins over
    // any prefix match.
    let mapping = providers.find_mapping(&resolved.model);
    match mapping {
        Some(m) => {
            tracing::debug!(agent, prefix = %m.prefix, model = %resolved.model, "matched provider prefix")
        }
        None => {
            tracing::debug!(agent, model = %resolved.model, "no prefix match, using default provider settings")
        }
    }
    resolved.client = patch
        .client
        .unwrap_or_else(|| mapping.map_or(providers.default.client, |m| m.client));
    resolved.api_mode = patch
        .api_mode
        .unwrap_or_else(|| mapping.map_or(providers.default.api_mode, |m| m.api_mode));

    // Remaining explicit overrides apply verbatim.
    if let Some(name) = &patch.name {
        resolved.name = name.clone();
    }
    if let Some(description) = &patch.description {
        resolved.description = description.clone();
    }
    if let Some(settings) = &patch.model_settings {
        resolved.model_settings = settings.clone();
    }
    if let Some(max_input_tokens) = patch.max_input_tokens {
        resolved.max_input_tokens = Some(max_input_tokens);
    }
    if let Some(base_url) = &patch.base_url {
        resolved.base_url = Some(base_url.clone());
    }
    if let Some(api_key) = &patch.api_key {
        resolved.api_key = Some(api_key.clone());
    }

    tracing::info!(
        agent,
        model = %resolved.model,
        client = %resolved.client,
        api_mode = %resolved.api_mode,
        "resolved agent configuration"
    );

    Ok(resolved)
}

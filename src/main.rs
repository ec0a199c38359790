// ABOUTME: Entry point for the gistd binary.
// ABOUTME: Loads configuration, wires the agent environment, and serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use gistd_agent::{AgentEnv, HttpClientFactory};
use gistd_core::AliasResolver;
use gistd_server::{AppState, GistdConfig, ProviderStatus, create_router};
use gistd_store::RunStore;

#[derive(Debug, Parser)]
#[command(name = "gistd", about = "Agentic text-digest service", version)]
struct Args {
    /// Path to the YAML configuration file (overrides GISTD_CONFIG).
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Socket address to bind (overrides GISTD_BIND).
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gistd=debug,tower_http=debug".parse().unwrap()),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => GistdConfig::load_with(Some(path))?,
        None => GistdConfig::load()?,
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("creating data directory {}", config.home.display()))?;
    let store = RunStore::open(&config.home).context("opening run store")?;

    let provider_status = ProviderStatus::from_credentials(&config.credentials);
    if !provider_status.any_available {
        tracing::warn!("no LLM provider credentials configured; runs will fail until one is set");
    }

    let factory = Arc::new(HttpClientFactory::new(config.credentials.clone()));
    let env = Arc::new(AgentEnv::new(
        config.agents.clone(),
        config.providers.clone(),
        AliasResolver::new(config.aliases.clone()),
        factory,
    ));

    let mut state = AppState::new(env, store, provider_status);
    state.auth_token = config.auth_token.clone();
    state.max_input_tokens = config.max_input_tokens;
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, home = %config.home.display(), "gistd listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

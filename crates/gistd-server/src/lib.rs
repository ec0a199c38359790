// ABOUTME: HTTP server for gistd, exposing summarizer workflows over a REST API.
// ABOUTME: Axum router with shared run-registry state, bearer auth, and run persistence.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod providers;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, GistdConfig};
pub use providers::ProviderStatus;
pub use routes::create_router;

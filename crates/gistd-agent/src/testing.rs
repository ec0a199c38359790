// ABOUTME: Scripted LlmClient implementations for tests.
// ABOUTME: Queue mode replays responses in order; responder mode inspects each request.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gistd_core::{AgentConfig, ClientKind};

use crate::client::{ClientFactory, CompletionRequest, CompletionResponse, LlmClient};
use crate::error::AgentError;

type Scripted = Result<CompletionResponse, AgentError>;
type Responder = dyn Fn(&CompletionRequest) -> Scripted + Send + Sync;

enum Behavior {
    Queue(Mutex<VecDeque<Scripted>>),
    Responder(Box<Responder>),
}

/// Test double for LlmClient. Records every request it receives.
pub struct MockLlmClient {
    behavior: Behavior,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    /// Replay the given responses in order; further calls fail.
    pub fn queued(responses: Vec<Scripted>) -> Self {
        Self {
            behavior: Behavior::Queue(Mutex::new(responses.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer each request through the given closure. Useful when calls
    /// arrive concurrently and queue order would be nondeterministic.
    pub fn respond_with<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Scripted + Send + Sync + 'static,
    {
        Self {
            behavior: Behavior::Responder(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: a successful response with the given text.
    pub fn text(text: &str) -> CompletionResponse {
        CompletionResponse {
            text: text.to_string(),
            total_tokens: 10,
        }
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AgentError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match &self.behavior {
            Behavior::Queue(queue) => queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or_else(|| {
                    Err(AgentError::Provider(
                        "mock response queue exhausted".to_string(),
                    ))
                }),
            Behavior::Responder(responder) => responder(&request),
        }
    }

    fn client_kind(&self) -> ClientKind {
        ClientKind::Litellm
    }
}

/// Factory handing the same mock client to every agent.
pub struct MockClientFactory {
    client: Arc<MockLlmClient>,
}

impl MockClientFactory {
    pub fn new(client: Arc<MockLlmClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Arc<MockLlmClient> {
        Arc::clone(&self.client)
    }
}

impl ClientFactory for MockClientFactory {
    fn create(&self, _config: &AgentConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
        Ok(Arc::clone(&self.client) as Arc<dyn LlmClient>)
    }
}

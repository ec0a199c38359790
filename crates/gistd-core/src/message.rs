// ABOUTME: Chat message types and hygiene filtering for LLM requests.
// ABOUTME: Empty messages are dropped with a logged warning, never sent to providers.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(s)
    }
}

/// A single message in a provider request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Drop messages with empty or whitespace-only content.
///
/// Logs a warning for each filtered message with its position and a short
/// preview of the previous non-empty message, so malformed inputs stay
/// traceable without failing the request.
pub fn filter_empty_messages(agent: &str, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut filtered = Vec::with_capacity(messages.len());
    let mut last_non_empty = String::new();

    for (idx, message) in messages.into_iter().enumerate() {
        if message.content.trim().is_empty() {
            let preview = if last_non_empty.is_empty() {
                "(no previous message)".to_string()
            } else if last_non_empty.chars().count() > 20 {
                let head: String = last_non_empty.chars().take(20).collect();
                format!("{}...", head)
            } else {
                last_non_empty.clone()
            };
            tracing::warn!(
                agent = agent,
                position = idx,
                previous = %preview,
                "filtering out empty message"
            );
            continue;
        }

        last_non_empty = message.content.clone();
        filtered.push(message);
    }

    filtered
}

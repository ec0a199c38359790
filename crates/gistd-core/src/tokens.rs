// ABOUTME: Rough token estimation used for input-size ceilings.
// ABOUTME: ~4 characters per token; close enough for a hard upper-bound check.

use crate::message::ChatMessage;

const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a piece of text.
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u32
}

/// Estimate the total token count of a message list.
pub fn estimate_message_tokens(messages: &[ChatMessage]) -> u32 {
    messages
        .iter()
        .map(|m| estimate_tokens(&m.content))
        .sum()
}

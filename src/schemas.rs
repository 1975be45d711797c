//! # Schemas Module
//!
//! Request body for OpenAI-compatible streaming chat completions. Responses
//! are not modelled as structs: stream frames are read as loose JSON so that
//! odd frames degrade to "no token" instead of a hard decode failure.

use serde::{Deserialize, Serialize};

/// System preamble sent ahead of every probe prompt.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant.";

/// # Chat Completion Request
///
/// Body of a single probe request. Streaming is always requested.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier
    pub model: String,
    /// Whether to stream the response (Server-Sent Events)
    pub stream: bool,
    /// Conversation: the fixed system preamble, then the probe prompt
    pub messages: Vec<Message>,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
}

impl ChatCompletionRequest {
    /// Build the streaming probe request for `prompt`.
    pub fn probe(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32, temperature: f64) -> Self {
        Self {
            model: model.into(),
            stream: true,
            messages: vec![Message::system(SYSTEM_PREAMBLE), Message::user(prompt)],
            max_tokens,
            temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of typed events.
//!
//! The stream is the contract the orchestration loop consumes: an ordered
//! sequence of content deltas, reasoning deltas, tool-call requests and usage,
//! terminated by exactly one `EndOfTurn`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};
use crate::tool::ToolDefinition;

/// How much deliberation the model should spend before answering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    #[default]
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "openai/gpt-4o-mini", "qwen3-8b")
    pub model: String,

    /// The full conversation so far
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call, in registration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Requested reasoning effort, for models that support it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Reasoning text returned alongside the answer, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Add another report into these counters. Never decreases.
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// One event in a streamed model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// Partial answer text
    ContentDelta { text: String },

    /// Partial reasoning-channel text
    ReasoningDelta { text: String },

    /// A fully assembled tool-call request
    ToolCall(MessageToolCall),

    /// Consumption reported for this turn
    Usage(Usage),

    /// The turn is over; no further events follow
    EndOfTurn {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

/// Receiving half of a streamed turn.
pub type ProviderStream = mpsc::Receiver<std::result::Result<ProviderEvent, ProviderError>>;

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The orchestration loop calls
/// `stream()` without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "lmstudio").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of turn events.
    ///
    /// Default implementation calls `complete()` and replays the result as
    /// reasoning, content, tool calls, usage and end-of-turn, in that order.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ProviderStream, ProviderError> {
        let response = self.complete(request).await?;
        let mut events = Vec::new();
        if let Some(reasoning) = response.reasoning.filter(|r| !r.is_empty()) {
            events.push(ProviderEvent::ReasoningDelta { text: reasoning });
        }
        if !response.message.content.is_empty() {
            events.push(ProviderEvent::ContentDelta { text: response.message.content });
        }
        events.extend(response.message.tool_calls.into_iter().map(ProviderEvent::ToolCall));
        if let Some(usage) = response.usage {
            events.push(ProviderEvent::Usage(usage));
        }
        events.push(ProviderEvent::EndOfTurn { finish_reason: None });

        let (tx, rx) = mpsc::channel(events.len());
        for event in events {
            let _ = tx.send(Ok(event)).await;
        }
        Ok(rx)
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

//! Session-level streaming events and the sinks that receive them.
//!
//! `AgentStreamEvent` is what a front end renders: content as it arrives,
//! the reasoning channel, tool activity and round boundaries. Sinks are
//! called inline by the loop, so `emit` must not block.

use serde::{Deserialize, Serialize};
use sleuth_core::provider::Usage;
use tokio::sync::mpsc;

/// Events emitted by a research session while it runs.
///
/// - `content`: partial answer text
/// - `reasoning`: partial reasoning-channel text
/// - `tool_call`: the model requested a tool
/// - `tool_result`: a tool call finished
/// - `notice`: a non-fatal condition (round limit reached)
/// - `round_complete`: control returns to the caller
/// - `error`: the round failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    Content { text: String },

    Reasoning { text: String },

    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    Notice { message: String },

    RoundComplete {
        round: u32,
        model_turns: u32,
        usage: Usage,
        limit_reached: bool,
    },

    Error { message: String },
}

impl AgentStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::Reasoning { .. } => "reasoning",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Notice { .. } => "notice",
            Self::RoundComplete { .. } => "round_complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Receives session events as they happen.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentStreamEvent);
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentStreamEvent) {}
}

/// Forwards events into an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AgentStreamEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentStreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: AgentStreamEvent) {
        // A dropped receiver only means nobody is watching
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_is_tagged() {
        let json = serde_json::to_string(&AgentStreamEvent::Content { text: "Hello".into() }).unwrap();
        assert_eq!(json, r#"{"type":"content","text":"Hello"}"#);

        let json = serde_json::to_string(&AgentStreamEvent::RoundComplete {
            round: 1,
            model_turns: 2,
            usage: Usage { prompt_tokens: 10, completion_tokens: 20, total_tokens: 30 },
            limit_reached: false,
        })
        .unwrap();
        assert!(json.contains(r#""type":"round_complete""#));
        assert!(json.contains(r#""total_tokens":30"#));
    }

    #[test]
    fn deserialization() {
        let event: AgentStreamEvent = serde_json::from_str(r#"{"type":"reasoning","text":"hmm"}"#).unwrap();
        assert_eq!(event, AgentStreamEvent::Reasoning { text: "hmm".into() });
        assert_eq!(event.event_type(), "reasoning");
    }

    #[test]
    fn channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(AgentStreamEvent::Content { text: "a".into() });
        sink.emit(AgentStreamEvent::Notice { message: "b".into() });
        assert_eq!(rx.try_recv().unwrap().event_type(), "content");
        assert_eq!(rx.try_recv().unwrap().event_type(), "notice");
    }

    #[test]
    fn channel_sink_tolerates_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(AgentStreamEvent::Error { message: "nobody listening".into() });
    }
}

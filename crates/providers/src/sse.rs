//! Decoder for OpenAI-style `text/event-stream` chat completion responses.
//!
//! Bytes go in, typed [`ProviderEvent`]s come out. Content and reasoning
//! deltas are emitted as soon as a full `data:` line is available. Tool-call
//! fragments are accumulated by index and emitted, in index order, only when
//! the turn ends, followed by usage and a single `EndOfTurn`.

use serde::Deserialize;
use sleuth_core::error::ProviderError;
use sleuth_core::message::MessageToolCall;
use sleuth_core::provider::{ProviderEvent, Usage};
use std::collections::BTreeMap;
use tracing::trace;

use crate::think::{Segment, ThinkTagSplitter};

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    think: ThinkTagSplitter,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[DONE]` has been seen; nothing after it matters.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes from the response body.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<ProviderEvent>, ProviderError> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            if self.done {
                self.buffer.clear();
                break;
            }
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            // Blank separators and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                self.done = true;
                continue;
            }
            self.handle_data(data, &mut events)?;
        }
        Ok(events)
    }

    fn handle_data(&mut self, data: &str, events: &mut Vec<ProviderEvent>) -> Result<(), ProviderError> {
        let chunk: StreamResponse = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(e) => {
                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                return Ok(());
            }
        };

        if let Some(error) = chunk.error {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| error.to_string());
            return Err(ProviderError::StreamInterrupted(message));
        }

        if let Some(choice) = chunk.choices.into_iter().next() {
            let delta = choice.delta;

            if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
                if !reasoning.is_empty() {
                    events.push(ProviderEvent::ReasoningDelta { text: reasoning });
                }
            }

            if let Some(content) = delta.content {
                for segment in self.think.push(&content) {
                    events.push(segment_event(segment));
                }
            }

            for tc in delta.tool_calls.unwrap_or_default() {
                let acc = self.tool_calls.entry(tc.index).or_default();
                if let Some(id) = tc.id.filter(|id| !id.is_empty()) {
                    acc.id = id;
                }
                if let Some(func) = tc.function {
                    if let Some(name) = func.name.filter(|n| !n.is_empty()) {
                        acc.name = name;
                    }
                    if let Some(args) = func.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }

            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }

        if let Some(usage) = chunk.usage {
            self.usage = Some(Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }
        Ok(())
    }

    /// Close the turn once the body is exhausted.
    ///
    /// A body that ends without `[DONE]` or a finish reason was cut off.
    pub fn finish(&mut self) -> Result<Vec<ProviderEvent>, ProviderError> {
        if !self.done && self.finish_reason.is_none() {
            return Err(ProviderError::StreamInterrupted(
                "response stream ended before the turn completed".into(),
            ));
        }

        let mut events: Vec<ProviderEvent> = self.think.finish().into_iter().map(segment_event).collect();
        events.extend(
            std::mem::take(&mut self.tool_calls)
                .into_values()
                .map(|acc| ProviderEvent::ToolCall(acc.into_tool_call())),
        );
        if let Some(usage) = self.usage.take() {
            events.push(ProviderEvent::Usage(usage));
        }
        events.push(ProviderEvent::EndOfTurn {
            finish_reason: self.finish_reason.take(),
        });
        Ok(events)
    }
}

fn segment_event(segment: Segment) -> ProviderEvent {
    match segment {
        Segment::Content(text) => ProviderEvent::ContentDelta { text },
        Segment::Reasoning(text) => ProviderEvent::ReasoningDelta { text },
    }
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> MessageToolCall {
        MessageToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta: arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse(lines: &[&str]) -> String {
        lines.iter().map(|l| format!("data: {l}\n\n")).collect()
    }

    #[test]
    fn content_deltas_then_end_of_turn() {
        let mut dec = SseDecoder::new();
        let body = sse(&[
            r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            "[DONE]",
        ]);
        let events = dec.feed(body.as_bytes()).unwrap();
        assert_eq!(
            events,
            vec![
                ProviderEvent::ContentDelta { text: "Hel".into() },
                ProviderEvent::ContentDelta { text: "lo".into() },
            ]
        );
        assert!(dec.is_done());

        let tail = dec.finish().unwrap();
        assert_eq!(
            tail,
            vec![
                ProviderEvent::Usage(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
                ProviderEvent::EndOfTurn { finish_reason: Some("stop".into()) },
            ]
        );
    }

    #[test]
    fn lines_split_across_byte_chunks() {
        let mut dec = SseDecoder::new();
        let body = sse(&[r#"{"choices":[{"delta":{"content":"split"}}]}"#]);
        let (a, b) = body.as_bytes().split_at(17);
        assert!(dec.feed(a).unwrap().is_empty());
        assert_eq!(
            dec.feed(b).unwrap(),
            vec![ProviderEvent::ContentDelta { text: "split".into() }]
        );
    }

    #[test]
    fn reasoning_fields_go_to_reasoning_channel() {
        let mut dec = SseDecoder::new();
        let body = sse(&[
            r#"{"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#,
            r#"{"choices":[{"delta":{"reasoning":"ok"}}]}"#,
            r#"{"choices":[{"delta":{"content":"<think>inline</think>answer"}}]}"#,
        ]);
        let events = dec.feed(body.as_bytes()).unwrap();
        assert_eq!(
            events,
            vec![
                ProviderEvent::ReasoningDelta { text: "hmm".into() },
                ProviderEvent::ReasoningDelta { text: "ok".into() },
                ProviderEvent::ReasoningDelta { text: "inline".into() },
                ProviderEvent::ContentDelta { text: "answer".into() },
            ]
        );
    }

    #[test]
    fn channel_block_split_across_content_deltas() {
        let mut dec = SseDecoder::new();
        let body = sse(&[
            r#"{"choices":[{"delta":{"content":"Sure. <|chan"}}]}"#,
            r#"{"choices":[{"delta":{"content":"nel|>analysis<|mess"}}]}"#,
            r#"{"choices":[{"delta":{"content":"age|>compare dates<|e"}}]}"#,
            r#"{"choices":[{"delta":{"content":"nd|>It was 1969."}}]}"#,
        ]);
        let events = dec.feed(body.as_bytes()).unwrap();
        assert_eq!(
            events,
            vec![
                ProviderEvent::ContentDelta { text: "Sure. ".into() },
                ProviderEvent::ReasoningDelta { text: "compare dates".into() },
                ProviderEvent::ContentDelta { text: "It was 1969.".into() },
            ]
        );
    }

    #[test]
    fn tool_calls_assembled_in_index_order() {
        let mut dec = SseDecoder::new();
        let body = sse(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"crawl_page","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"duckduckgo_search","arguments":"{\"search_"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"query\":\"rust\"}"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"function":{"arguments":"{\"url\":\"https://a.b\"}"}}]},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]);
        assert!(dec.feed(body.as_bytes()).unwrap().is_empty());
        let events = dec.finish().unwrap();
        assert_eq!(events.len(), 3);
        match (&events[0], &events[1]) {
            (ProviderEvent::ToolCall(a), ProviderEvent::ToolCall(b)) => {
                assert_eq!(a.id, "call_a");
                assert_eq!(a.arguments, r#"{"search_query":"rust"}"#);
                assert_eq!(b.id, "call_b");
                assert_eq!(b.name, "crawl_page");
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(matches!(events[2], ProviderEvent::EndOfTurn { .. }));
    }

    #[test]
    fn truncated_stream_is_interrupted() {
        let mut dec = SseDecoder::new();
        dec.feed(sse(&[r#"{"choices":[{"delta":{"content":"partial"}}]}"#]).as_bytes())
            .unwrap();
        assert!(matches!(dec.finish(), Err(ProviderError::StreamInterrupted(_))));
    }

    #[test]
    fn error_chunk_interrupts() {
        let mut dec = SseDecoder::new();
        let err = dec
            .feed(sse(&[r#"{"error":{"message":"upstream overloaded"}}"#]).as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("upstream overloaded"));
    }

    #[test]
    fn comments_and_garbage_are_skipped() {
        let mut dec = SseDecoder::new();
        let body = ": keep-alive\n\ndata: not json\n\nevent: ping\n\n";
        assert!(dec.feed(body.as_bytes()).unwrap().is_empty());
    }
}

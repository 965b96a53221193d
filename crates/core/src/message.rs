//! Message and conversation-state domain types.
//!
//! `ConversationState` is the ordered dialogue the orchestration loop replays to
//! the LLM on every turn, plus the running token counters for the session.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConversationError;
use crate::provider::Usage;

/// Unique identifier for a research session's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<MessageToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content.into());
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// A tool call embedded in an assistant message, exactly as the LLM issued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call (echoed back in the tool result)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a raw JSON string
    pub arguments: String,
}

/// The evolving dialogue of one research session.
///
/// Messages are append-only. The system prompt is fixed at construction and
/// always occupies the first slot. Every tool message must answer a tool call
/// issued by an earlier assistant message, and each call is answered once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Unique conversation ID
    pub id: ConversationId,

    system_prompt: String,
    messages: Vec<Message>,
    usage: Usage,

    #[serde(skip)]
    issued_calls: HashSet<String>,
    #[serde(skip)]
    answered_calls: HashSet<String>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Start a conversation with the given system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: vec![Message::system(system_prompt.clone())],
            system_prompt,
            usage: Usage::default(),
            issued_calls: HashSet::new(),
            answered_calls: HashSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Append an assistant turn that requested tools. Its call ids become
    /// answerable by subsequent tool results.
    pub fn push_assistant_tool_calls(
        &mut self,
        content: impl Into<String>,
        tool_calls: Vec<MessageToolCall>,
    ) {
        for call in &tool_calls {
            self.issued_calls.insert(call.id.clone());
        }
        self.push(Message::assistant_tool_calls(content, tool_calls));
    }

    /// Append a tool result, rejecting results that answer no issued call.
    pub fn push_tool_result(
        &mut self,
        tool_call_id: &str,
        content: impl Into<String>,
    ) -> Result<(), ConversationError> {
        if !self.issued_calls.contains(tool_call_id) {
            return Err(ConversationError::DanglingToolResult(tool_call_id.to_string()));
        }
        if !self.answered_calls.insert(tool_call_id.to_string()) {
            return Err(ConversationError::DuplicateToolResult(tool_call_id.to_string()));
        }
        self.push(Message::tool_result(tool_call_id, content));
        Ok(())
    }

    /// Tool calls that were issued but have not been answered yet.
    pub fn pending_tool_calls(&self) -> Vec<&str> {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .map(|c| c.id.as_str())
            .filter(|id| !self.answered_calls.contains(*id))
            .collect()
    }

    /// Fold one turn's reported consumption into the running counters.
    pub fn record_usage(&mut self, usage: &Usage) {
        self.usage.accumulate(usage);
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content.len() / 4).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: "duckduckgo_search".into(),
            arguments: r#"{"search_query":"rust"}"#.into(),
        }
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn conversation_starts_with_system_prompt() {
        let conv = ConversationState::new("You are a researcher.");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.system_prompt(), "You are a researcher.");
    }

    #[test]
    fn tool_result_must_answer_issued_call() {
        let mut conv = ConversationState::new("sys");
        let err = conv.push_tool_result("call_1", "[]").unwrap_err();
        assert!(matches!(err, ConversationError::DanglingToolResult(_)));
        assert_eq!(conv.len(), 1);

        conv.push_assistant_tool_calls("", vec![call("call_1")]);
        conv.push_tool_result("call_1", "[]").unwrap();
        assert_eq!(conv.last().unwrap().tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_result_cannot_answer_twice() {
        let mut conv = ConversationState::new("sys");
        conv.push_assistant_tool_calls("", vec![call("call_1")]);
        conv.push_tool_result("call_1", "first").unwrap();
        let err = conv.push_tool_result("call_1", "second").unwrap_err();
        assert!(matches!(err, ConversationError::DuplicateToolResult(_)));
    }

    #[test]
    fn pending_calls_track_unanswered_ids() {
        let mut conv = ConversationState::new("sys");
        conv.push_assistant_tool_calls("", vec![call("a"), call("b")]);
        conv.push_tool_result("a", "ok").unwrap();
        assert_eq!(conv.pending_tool_calls(), vec!["b"]);
    }

    #[test]
    fn usage_is_additive() {
        let mut conv = ConversationState::new("sys");
        conv.record_usage(&Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 });
        conv.record_usage(&Usage { prompt_tokens: 20, completion_tokens: 2, total_tokens: 22 });
        assert_eq!(conv.usage().prompt_tokens, 30);
        assert_eq!(conv.usage().completion_tokens, 7);
        assert_eq!(conv.usage().total_tokens, 37);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::tool_result("call_9", "done");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.role, Role::Tool);
        assert_eq!(deserialized.tool_call_id.as_deref(), Some("call_9"));
    }

    #[test]
    fn conversation_token_estimate() {
        let mut conv = ConversationState::new("");
        // 20 chars ≈ 5 tokens
        conv.push_user("12345678901234567890");
        assert_eq!(conv.estimated_tokens(), 5);
    }
}

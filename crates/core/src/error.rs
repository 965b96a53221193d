//! Error types for the sleuth domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Errors raised inside the tool-dispatch path (`ToolError`, `KnowledgeError`)
//! are recoverable: the dispatcher renders them into the conversation.
//! Everything else terminates the current round.

use thiserror::Error;

/// The top-level error type for all sleuth operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Knowledge store errors ---
    #[error("Knowledge store error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Conversation bookkeeping ---
    #[error("Conversation invariant violated: {0}")]
    Conversation(#[from] ConversationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Session control ---
    #[error("Session cancelled")]
    Cancelled,

    #[error("Round timed out after {secs}s")]
    Timeout { secs: u64 },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no tool named '{0}' is registered")]
    NotFound(String),

    #[error("a tool named '{0}' is already registered")]
    Duplicate(String),

    #[error("{0}")]
    InvalidArguments(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}

impl ToolError {
    /// Stable label used in the conversation-facing error string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "UnknownTool",
            Self::Duplicate(_) => "DuplicateTool",
            Self::InvalidArguments(_) => "ValidationError",
            Self::ExecutionFailed { .. } => "HandlerFailure",
            Self::Knowledge(e) => e.kind(),
        }
    }

    /// Render as the string fed back to the model: `Error: <kind> — <message>`.
    pub fn to_conversation_string(&self) -> String {
        format!("Error: {} — {}", self.kind(), self)
    }
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("knowledge file is corrupt: {0}")]
    Corrupt(String),

    #[error("timed out after {waited_ms}ms waiting for the knowledge write lock")]
    LockTimeout { waited_ms: u64 },

    #[error("knowledge store would grow to {attempted} bytes, limit is {limit} bytes")]
    CapacityExceeded { limit: u64, attempted: u64 },
}

impl KnowledgeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "CapacityExceeded",
            Self::Storage(_) | Self::Corrupt(_) | Self::LockTimeout { .. } => "StorageError",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ConversationError {
    #[error("tool result for '{0}' has no matching assistant tool call")]
    DanglingToolResult(String),

    #[error("tool call '{0}' already has a result")]
    DuplicateToolResult(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_kinds() {
        assert_eq!(ToolError::NotFound("x".into()).kind(), "UnknownTool");
        assert_eq!(ToolError::Duplicate("x".into()).kind(), "DuplicateTool");
        assert_eq!(ToolError::InvalidArguments("x".into()).kind(), "ValidationError");
        assert_eq!(
            ToolError::ExecutionFailed { tool_name: "t".into(), reason: "r".into() }.kind(),
            "HandlerFailure"
        );
        assert_eq!(
            ToolError::from(KnowledgeError::Storage("disk".into())).kind(),
            "StorageError"
        );
        assert_eq!(
            ToolError::from(KnowledgeError::CapacityExceeded { limit: 1, attempted: 2 }).kind(),
            "CapacityExceeded"
        );
    }

    #[test]
    fn conversation_string_names_kind_and_message() {
        let err = ToolError::NotFound("web_browse".into());
        let s = err.to_conversation_string();
        assert!(s.starts_with("Error: UnknownTool — "));
        assert!(s.contains("web_browse"));
    }
}

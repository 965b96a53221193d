//! # Sleuth Core
//!
//! Domain types, traits, and error definitions for the sleuth research agent.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability (LLM, tool, knowledge store) is a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/in-memory implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{KnowledgeEntry, KnowledgeStore};
pub use message::{ConversationId, ConversationState, Message, MessageToolCall, Role};
pub use prompt::SystemPrompt;
pub use provider::{Provider, ProviderEvent, ProviderRequest, ProviderResponse, ReasoningEffort, Usage};
pub use tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolDefinition, ToolOutput, ToolRegistry, ToolResult};

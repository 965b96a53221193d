//! The research orchestration loop.
//!
//! A session alternates between the model and the tools:
//!
//! 1. **Send** the conversation and the tool schemas to the provider
//! 2. **Stream** the turn, forwarding content and reasoning deltas
//! 3. **If tool calls**: dispatch them, append the results, go back to 1
//! 4. **If text only**: the round is complete and the caller may follow up
//!
//! Rounds are bounded by a model-turn limit, an optional wall-clock timeout
//! and a cancellation token.

pub mod dispatcher;
pub mod loop_runner;
pub mod reasoning;
pub mod state;
pub mod stream_event;

pub use dispatcher::ToolDispatcher;
pub use loop_runner::{ResearchSession, RoundSummary, SessionOptions, UserInput};
pub use reasoning::{ReasoningLog, ReasoningStep};
pub use state::SessionState;
pub use stream_event::{AgentStreamEvent, ChannelSink, EventSink, NullSink};

//! States of a research session and the moves allowed between them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, nothing sent yet
    Idle,
    /// Request sent, waiting for the first event
    AwaitingModel,
    /// Consuming the model's event stream
    StreamingResponse,
    /// Running the tool calls of the last turn
    DispatchingTools,
    /// The round ended; per-round hooks run here
    RoundComplete,
    /// Waiting for a follow-up from the caller
    AwaitingUserInput,
    Terminated,
}

impl SessionState {
    /// Whether the state machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Idle, AwaitingModel)
            | (AwaitingModel, StreamingResponse)
            | (AwaitingModel, RoundComplete)
            | (StreamingResponse, DispatchingTools)
            | (StreamingResponse, RoundComplete)
            | (DispatchingTools, AwaitingModel)
            | (RoundComplete, AwaitingUserInput)
            | (AwaitingUserInput, AwaitingModel) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingModel => "awaiting_model",
            Self::StreamingResponse => "streaming_response",
            Self::DispatchingTools => "dispatching_tools",
            Self::RoundComplete => "round_complete",
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;
    use super::*;

    #[test]
    fn happy_path_round_trip() {
        let path = [
            Idle,
            AwaitingModel,
            StreamingResponse,
            DispatchingTools,
            AwaitingModel,
            StreamingResponse,
            RoundComplete,
            AwaitingUserInput,
            AwaitingModel,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn illegal_moves() {
        assert!(!Idle.can_transition_to(StreamingResponse));
        assert!(!StreamingResponse.can_transition_to(AwaitingUserInput));
        assert!(!DispatchingTools.can_transition_to(RoundComplete));
        assert!(!AwaitingUserInput.can_transition_to(DispatchingTools));
    }

    #[test]
    fn terminated_is_absorbing() {
        for state in [Idle, AwaitingModel, StreamingResponse, DispatchingTools, RoundComplete, AwaitingUserInput] {
            assert!(state.can_transition_to(Terminated));
            assert!(!Terminated.can_transition_to(state));
        }
        assert!(Terminated.is_terminal());
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(AwaitingUserInput.to_string(), "awaiting_user_input");
        assert_eq!(serde_json::to_string(&DispatchingTools).unwrap(), r#""dispatching_tools""#);
    }
}

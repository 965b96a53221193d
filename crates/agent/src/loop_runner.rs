//! The research orchestration loop.
//!
//! A [`ResearchSession`] owns the conversation and walks the state machine
//! in [`crate::state`]. One call to [`ResearchSession::run_round`] drives
//! model turns and tool dispatch until the model answers without requesting
//! tools, then hands control back to the caller for follow-up input.
//!
//! Model turns of a session are strictly serialized. Only the tool calls of
//! a single turn run concurrently.

use async_trait::async_trait;
use chrono::Utc;
use sleuth_config::AppConfig;
use sleuth_core::error::{Error, ProviderError, Result};
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::knowledge::KnowledgeStore;
use sleuth_core::message::{ConversationState, MessageToolCall};
use sleuth_core::prompt::{SystemPrompt, initial_user_message};
use sleuth_core::provider::{Provider, ProviderEvent, ProviderRequest, ProviderStream, ReasoningEffort, Usage};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatcher::ToolDispatcher;
use crate::reasoning::ReasoningLog;
use crate::state::SessionState;
use crate::stream_event::{AgentStreamEvent, EventSink, NullSink};

/// Per-session knobs, usually taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Model turns allowed inside one round before control is handed back
    pub max_model_turns: u32,
    /// Wall-clock budget of one round
    pub round_timeout: Option<Duration>,
    pub parallel_tool_calls: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.7,
            max_tokens: None,
            reasoning_effort: None,
            max_model_turns: 25,
            round_timeout: Some(Duration::from_secs(600)),
            parallel_tool_calls: true,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout_secs = config.agent.round_timeout_secs;
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            reasoning_effort: config.provider.reasoning_effort,
            max_model_turns: config.agent.max_rounds,
            round_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            parallel_tool_calls: config.agent.parallel_tool_calls,
        }
    }
}

/// What one round produced.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round: u32,
    pub model_turns: u32,
    /// The model's closing answer; `None` when the turn limit cut the round
    pub final_content: Option<String>,
    pub limit_reached: bool,
    /// Session totals after this round
    pub usage: Usage,
}

/// Source of follow-up input between rounds.
#[async_trait]
pub trait UserInput: Send {
    /// The next follow-up, or `None` once input is exhausted.
    async fn next_input(&mut self) -> Option<String>;
}

#[derive(Debug, Default)]
struct TurnOutput {
    content: String,
    tool_calls: Vec<MessageToolCall>,
    usage: Option<Usage>,
}

pub struct ResearchSession {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    store: Arc<dyn KnowledgeStore>,
    options: SessionOptions,
    conversation: ConversationState,
    state: SessionState,
    reasoning: ReasoningLog,
    event_bus: Arc<EventBus>,
    sink: Arc<dyn EventSink>,
    round: u32,
    seen_call_ids: HashSet<String>,
}

impl ResearchSession {
    /// Seed a session with the system prompt and the research query.
    ///
    /// Nothing is sent and the knowledge store is untouched until the first
    /// [`run_round`](Self::run_round).
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: ToolDispatcher,
        store: Arc<dyn KnowledgeStore>,
        system_prompt: &SystemPrompt,
        query: &str,
        options: SessionOptions,
    ) -> Self {
        let mut conversation = ConversationState::new(system_prompt.text.clone());
        conversation.push_user(initial_user_message(query));
        info!(
            conversation_id = %conversation.id,
            provider = provider.name(),
            model = %options.model,
            "Research session created"
        );

        Self {
            provider,
            dispatcher: dispatcher.with_parallel(options.parallel_tool_calls),
            store,
            options,
            conversation,
            state: SessionState::Idle,
            reasoning: ReasoningLog::new(),
            event_bus: Arc::new(EventBus::default()),
            sink: Arc::new(NullSink),
            round: 0,
            seen_call_ids: HashSet::new(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn reasoning(&self) -> &ReasoningLog {
        &self.reasoning
    }

    pub fn usage(&self) -> &Usage {
        self.conversation.usage()
    }

    /// Rounds started so far.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run one round: model turns and tool dispatch until the model answers
    /// without tool calls or the turn limit is hit.
    ///
    /// Cancellation, the round timeout and provider faults abort the round
    /// and terminate the session. The conversation keeps whatever was
    /// appended before the abort.
    pub async fn run_round(&mut self, cancel: &CancellationToken) -> Result<RoundSummary> {
        match self.state {
            SessionState::Idle => {
                if let Err(e) = self.store.reset().await {
                    let e = Error::from(e);
                    self.fail(&e);
                    return Err(e);
                }
                info!(store = self.store.name(), "Knowledge store reset for new session");
                self.transition(SessionState::AwaitingModel)?;
            }
            SessionState::AwaitingModel => {}
            other => {
                return Err(Error::Internal(format!("cannot start a round while {other}")));
            }
        }

        self.round += 1;
        let round = self.round;
        let timeout = self.options.round_timeout;

        let outcome = {
            let work = self.drive_round(round);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = bounded(timeout, work) => result,
            }
        };

        if let Err(e) = &outcome {
            self.fail(e);
        }
        outcome
    }

    /// Hand follow-up input to a session waiting for it.
    ///
    /// Blank input ends the session; returns whether another round follows.
    pub fn submit_user_input(&mut self, input: &str) -> Result<bool> {
        if self.state != SessionState::AwaitingUserInput {
            return Err(Error::Internal(format!("not waiting for input (state: {})", self.state)));
        }
        let input = input.trim();
        if input.is_empty() {
            info!("Empty follow-up, ending session");
            self.terminate();
            return Ok(false);
        }
        self.conversation.push_user(input);
        self.transition(SessionState::AwaitingModel)?;
        Ok(true)
    }

    /// Run rounds until the input source is exhausted or yields a blank line.
    pub async fn drive(&mut self, input: &mut dyn UserInput, cancel: &CancellationToken) -> Result<()> {
        loop {
            self.run_round(cancel).await?;

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                line = input.next_input() => line,
            };
            let more = match next {
                Some(line) => self.submit_user_input(&line)?,
                None => false,
            };
            if !more {
                self.terminate();
                return Ok(());
            }
        }
    }

    pub fn terminate(&mut self) {
        if !self.state.is_terminal() {
            self.enter(SessionState::Terminated);
            info!(
                conversation_id = %self.conversation.id,
                rounds = self.round,
                total_tokens = self.conversation.usage().total_tokens,
                "Research session ended"
            );
        }
    }

    async fn drive_round(&mut self, round: u32) -> Result<RoundSummary> {
        let tools = self.dispatcher.registry().list_schemas();
        let mut model_turns = 0u32;

        loop {
            if model_turns > 0 {
                self.transition(SessionState::AwaitingModel)?;
            }
            if model_turns >= self.options.max_model_turns {
                warn!(round, model_turns, "Round limit reached, yielding to the caller");
                self.transition(SessionState::RoundComplete)?;
                self.sink.emit(AgentStreamEvent::Notice {
                    message: format!("RoundLimitReached: stopped after {model_turns} model turns in this round"),
                });
                return self.finish_round(round, model_turns, None, true);
            }
            model_turns += 1;

            let request = ProviderRequest {
                model: self.options.model.clone(),
                messages: self.conversation.messages().to_vec(),
                temperature: self.options.temperature,
                max_tokens: self.options.max_tokens,
                tools: tools.clone(),
                reasoning_effort: self.options.reasoning_effort,
            };
            debug!(round, turn = model_turns, messages = request.messages.len(), "Requesting model turn");

            let mut stream = self.provider.stream(request).await?;
            self.transition(SessionState::StreamingResponse)?;
            let turn = self.consume_turn(round, &mut stream).await?;

            if let Some(usage) = &turn.usage {
                self.conversation.record_usage(usage);
            }

            if turn.tool_calls.is_empty() {
                self.conversation.push_assistant(turn.content.clone());
                self.transition(SessionState::RoundComplete)?;
                return self.finish_round(round, model_turns, Some(turn.content), false);
            }

            let calls = self.assign_call_ids(turn.tool_calls);
            self.conversation.push_assistant_tool_calls(turn.content, calls.clone());
            self.transition(SessionState::DispatchingTools)?;

            for call in &calls {
                info!(round, tool = %call.name, call_id = %call.id, "Dispatching tool call");
                self.sink.emit(AgentStreamEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }

            for result in self.dispatcher.dispatch_all(&calls).await {
                self.sink.emit(AgentStreamEvent::ToolResult {
                    id: result.call_id.clone(),
                    name: result.tool_name.clone(),
                    output: result.output.clone(),
                    success: result.success,
                });
                self.conversation.push_tool_result(&result.call_id, result.output)?;
            }
        }
    }

    /// Consume one streamed model turn, forwarding deltas as they arrive.
    async fn consume_turn(&mut self, round: u32, stream: &mut ProviderStream) -> Result<TurnOutput> {
        let mut turn = TurnOutput::default();

        while let Some(item) = stream.recv().await {
            match item? {
                ProviderEvent::ContentDelta { text } => {
                    self.reasoning.close_step();
                    turn.content.push_str(&text);
                    self.sink.emit(AgentStreamEvent::Content { text });
                }
                ProviderEvent::ReasoningDelta { text } => {
                    self.reasoning.append(round, &text);
                    self.sink.emit(AgentStreamEvent::Reasoning { text });
                }
                ProviderEvent::ToolCall(call) => {
                    self.reasoning.close_step();
                    turn.tool_calls.push(call);
                }
                ProviderEvent::Usage(usage) => {
                    turn.usage.get_or_insert_with(Usage::default).accumulate(&usage);
                }
                ProviderEvent::EndOfTurn { finish_reason } => {
                    self.reasoning.close_step();
                    debug!(
                        round,
                        finish_reason = finish_reason.as_deref().unwrap_or("none"),
                        tool_calls = turn.tool_calls.len(),
                        "Model turn ended"
                    );
                    return Ok(turn);
                }
            }
        }

        Err(ProviderError::StreamInterrupted("event stream closed before the end of the turn".into()).into())
    }

    /// Give every call an id unique within the session. Some local models
    /// send empty ids or reuse them across turns.
    fn assign_call_ids(&mut self, calls: Vec<MessageToolCall>) -> Vec<MessageToolCall> {
        calls
            .into_iter()
            .map(|mut call| {
                if call.id.is_empty() || self.seen_call_ids.contains(&call.id) {
                    let generated = format!("call_{}", Uuid::new_v4().simple());
                    debug!(original = %call.id, generated = %generated, "Assigned tool call id");
                    call.id = generated;
                }
                self.seen_call_ids.insert(call.id.clone());
                call
            })
            .collect()
    }

    fn finish_round(
        &mut self,
        round: u32,
        model_turns: u32,
        final_content: Option<String>,
        limit_reached: bool,
    ) -> Result<RoundSummary> {
        self.reasoning.close_step();
        let usage = self.conversation.usage().clone();

        self.event_bus.publish(DomainEvent::RoundCompleted {
            conversation_id: self.conversation.id.to_string(),
            round,
            model_turns,
            total_tokens: usage.total_tokens,
            timestamp: Utc::now(),
        });
        self.sink.emit(AgentStreamEvent::RoundComplete {
            round,
            model_turns,
            usage: usage.clone(),
            limit_reached,
        });
        self.transition(SessionState::AwaitingUserInput)?;

        info!(
            round,
            model_turns,
            limit_reached,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Round complete"
        );
        Ok(RoundSummary {
            round,
            model_turns,
            final_content,
            limit_reached,
            usage,
        })
    }

    fn fail(&mut self, e: &Error) {
        match e {
            Error::Cancelled => warn!(round = self.round, "Research round cancelled"),
            _ => error!(round = self.round, error = %e, "Research round aborted"),
        }
        self.reasoning.close_step();
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: format!("round {}", self.round),
            error_message: e.to_string(),
            timestamp: Utc::now(),
        });
        self.sink.emit(AgentStreamEvent::Error { message: e.to_string() });
        self.terminate();
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "illegal session transition {} -> {next}",
                self.state
            )));
        }
        self.enter(next);
        Ok(())
    }

    fn enter(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session state changed");
        self.event_bus.publish(DomainEvent::SessionStateChanged {
            from: self.state.to_string(),
            to: next.to_string(),
            timestamp: Utc::now(),
        });
        self.state = next;
    }
}

async fn bounded<F>(limit: Option<Duration>, work: F) -> Result<RoundSummary>
where
    F: Future<Output = Result<RoundSummary>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .unwrap_or_else(|_| Err(Error::Timeout { secs: limit.as_secs() })),
        None => work.await,
    }
}

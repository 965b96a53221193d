//! Tool dispatch: the boundary between model requests and tool handlers.
//!
//! Nothing that goes wrong on this side of the boundary escapes it. Unknown
//! tools, malformed arguments, handler errors and handler panics all come
//! back as a failed [`ToolResult`] whose output is the error string the model
//! will read on its next turn.

use chrono::Utc;
use futures::FutureExt;
use serde_json::{Value, json};
use sleuth_core::error::ToolError;
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::message::MessageToolCall;
use sleuth_core::tool::{ToolOutput, ToolRegistry, ToolResult};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
    parallel: bool,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            event_bus,
            parallel: true,
        }
    }

    /// Run the calls of one turn concurrently (default) or one after another.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one tool call. Never fails; failures are in the result.
    pub async fn dispatch(&self, request: &MessageToolCall) -> ToolResult {
        let start = Instant::now();
        let outcome = self.execute(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(output) => {
                debug!(tool = %request.name, call_id = %request.id, duration_ms, "Tool call succeeded");
                ToolResult {
                    call_id: request.id.clone(),
                    tool_name: request.name.clone(),
                    success: true,
                    output: output.content,
                    data: output.data,
                }
            }
            Err(e) => {
                error!(
                    tool = %request.name,
                    call_id = %request.id,
                    arguments = %request.arguments,
                    kind = e.kind(),
                    error = %e,
                    duration_ms,
                    "Tool call failed"
                );
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: format!("tool {} ({})", request.name, request.id),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                ToolResult {
                    call_id: request.id.clone(),
                    tool_name: request.name.clone(),
                    success: false,
                    output: e.to_conversation_string(),
                    data: Some(json!({ "error_kind": e.kind() })),
                }
            }
        };

        self.event_bus.publish(DomainEvent::ToolDispatched {
            call_id: result.call_id.clone(),
            tool_name: result.tool_name.clone(),
            success: result.success,
            duration_ms,
            timestamp: Utc::now(),
        });
        result
    }

    /// Execute every call of a turn. Results come back in request order,
    /// whatever order the handlers finish in.
    pub async fn dispatch_all(&self, requests: &[MessageToolCall]) -> Vec<ToolResult> {
        if self.parallel && requests.len() > 1 {
            futures::future::join_all(requests.iter().map(|r| self.dispatch(r))).await
        } else {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.dispatch(request).await);
            }
            results
        }
    }

    async fn execute(&self, request: &MessageToolCall) -> Result<ToolOutput, ToolError> {
        let tool = self.registry.resolve(&request.name)?;
        let arguments = parse_arguments(&request.arguments)?;
        tool.parameters()
            .validate(&arguments)
            .map_err(ToolError::InvalidArguments)?;

        match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(ToolError::ExecutionFailed {
                tool_name: request.name.clone(),
                reason: format!("handler panicked: {}", panic_message(panic.as_ref())),
            }),
        }
    }
}

/// Arguments arrive as the raw JSON text the model produced. An empty string
/// means no arguments.
fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

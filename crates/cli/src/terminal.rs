//! Terminal rendering of a research session.

use async_trait::async_trait;
use sleuth_agent::{AgentStreamEvent, EventSink, UserInput};
use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::warn;

const GREY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

/// Streams answer text to stdout and everything else to stderr.
/// Reasoning is printed in grey.
pub struct TerminalSink {
    show_reasoning: bool,
    in_reasoning: AtomicBool,
}

impl TerminalSink {
    pub fn new(show_reasoning: bool) -> Self {
        Self {
            show_reasoning,
            in_reasoning: AtomicBool::new(false),
        }
    }

    fn end_reasoning(&self, out: &mut impl Write) {
        if self.in_reasoning.swap(false, Ordering::Relaxed) {
            let _ = write!(out, "{RESET}\n\n");
        }
    }
}

impl EventSink for TerminalSink {
    fn emit(&self, event: AgentStreamEvent) {
        let mut out = std::io::stdout().lock();
        match event {
            AgentStreamEvent::Reasoning { text } => {
                if !self.show_reasoning {
                    return;
                }
                if !self.in_reasoning.swap(true, Ordering::Relaxed) {
                    let _ = write!(out, "{GREY}");
                }
                let _ = write!(out, "{text}");
            }
            AgentStreamEvent::Content { text } => {
                self.end_reasoning(&mut out);
                let _ = write!(out, "{text}");
            }
            AgentStreamEvent::ToolCall { name, arguments, .. } => {
                self.end_reasoning(&mut out);
                let _ = out.flush();
                eprintln!("\n  → {name} {arguments}");
            }
            AgentStreamEvent::ToolResult { name, output, success, .. } => {
                let status = if success { "ok" } else { "failed" };
                eprintln!("  ← {name}: {status} ({} chars)", output.chars().count());
            }
            AgentStreamEvent::Notice { message } => {
                self.end_reasoning(&mut out);
                let _ = out.flush();
                eprintln!("\n  [notice] {message}");
            }
            AgentStreamEvent::RoundComplete { usage, .. } => {
                self.end_reasoning(&mut out);
                let _ = writeln!(out);
                let _ = out.flush();
                eprintln!(
                    "\n  Tokens: {} prompt / {} completion / {} total",
                    usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                );
            }
            AgentStreamEvent::Error { message } => {
                self.end_reasoning(&mut out);
                let _ = out.flush();
                eprintln!("\n  [error] {message}");
            }
        }
        let _ = out.flush();
    }
}

/// Reads follow-ups from stdin, one line each.
///
/// Lines are read on a dedicated thread that is never joined, so a read
/// blocked on the terminal cannot hold the runtime open at shutdown.
pub struct StdinInput {
    lines: mpsc::Receiver<String>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            lines: spawn_line_reader(reader),
        }
    }

    /// Print `prompt` and read one line. `None` at end of input.
    pub async fn ask(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        self.lines.recv().await
    }
}

#[async_trait]
impl UserInput for StdinInput {
    async fn next_input(&mut self) -> Option<String> {
        self.ask("\nYou (leave blank to exit): ").await
    }
}

/// Forward lines from `reader` until end of input, a read error, or the
/// receiver going away.
fn spawn_line_reader<R: BufRead + Send + 'static>(reader: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Could not start the stdin reader");
    }
    rx
}

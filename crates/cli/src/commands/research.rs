//! `sleuth research`: run a research session.

use sleuth_agent::{ResearchSession, SessionOptions, ToolDispatcher};
use sleuth_config::AppConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::knowledge::KnowledgeStore;
use sleuth_core::prompt::SystemPrompt;
use sleuth_memory::{FileKnowledgeStore, StoreOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::terminal::{StdinInput, TerminalSink};

pub async fn run(
    config: &AppConfig,
    query: Option<String>,
    once: bool,
    show_reasoning: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Build the provider first so a missing key fails before any prompt
    let provider = match sleuth_providers::build_from_config(config) {
        Ok(provider) => provider,
        Err(ProviderError::NotConfigured(reason)) => {
            print_key_help();
            return Err(reason.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdin = StdinInput::new();
    let query = match query {
        Some(q) => q,
        None => stdin.ask("Enter your research query: ").await.unwrap_or_default(),
    };
    let query = query.trim().to_string();
    if query.is_empty() {
        return Err("A research query is required.".into());
    }

    let store: Arc<dyn KnowledgeStore> = Arc::new(FileKnowledgeStore::new(
        config.knowledge_path(),
        StoreOptions {
            id_base: config.knowledge.id_base,
            max_bytes: config.knowledge.max_bytes,
            lock_timeout: Duration::from_millis(config.knowledge.lock_timeout_ms),
        },
    ));

    let event_bus = Arc::new(EventBus::default());
    tokio::spawn(log_domain_events(event_bus.subscribe()));
    let registry = sleuth_tools::default_registry(config, Arc::clone(&store), Arc::clone(&event_bus))?;
    let dispatcher = ToolDispatcher::new(Arc::new(registry), Arc::clone(&event_bus));

    let system_prompt = SystemPrompt::load(config.agent.system_prompt_template.as_deref(), &query);
    info!(
        source = ?system_prompt.source,
        prompt_tokens = system_prompt.estimated_tokens(),
        "System prompt loaded"
    );

    let mut session = ResearchSession::new(
        provider,
        dispatcher,
        store,
        &system_prompt,
        &query,
        SessionOptions::from_config(config),
    )
    .with_event_bus(event_bus)
    .with_sink(Arc::new(TerminalSink::new(show_reasoning)));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt.is_cancelled() {
                warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
            warn!("Interrupted, ending the session");
            on_interrupt.cancel();
        }
    });

    if once {
        session.run_round(&cancel).await?;
        session.terminate();
    } else {
        session.drive(&mut stdin, &cancel).await?;
    }

    let usage = session.usage();
    eprintln!();
    eprintln!(
        "  Session finished after {} round(s), {} tokens in total.",
        session.round(),
        usage.total_tokens
    );
    Ok(())
}

/// Log domain events at debug level until the bus goes away.
/// Returns the number of events seen.
async fn log_domain_events(mut rx: broadcast::Receiver<Arc<DomainEvent>>) -> u64 {
    let mut seen = 0;
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Domain event log fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return seen,
        };
        seen += 1;
        match event.as_ref() {
            DomainEvent::ToolDispatched { call_id, tool_name, success, duration_ms, .. } => {
                debug!(%call_id, %tool_name, success, duration_ms, "Tool dispatched");
            }
            DomainEvent::KnowledgeSaved { id, bytes, .. } => {
                debug!(id, bytes, "Finding saved");
            }
            DomainEvent::RoundCompleted { conversation_id, round, model_turns, total_tokens, .. } => {
                debug!(%conversation_id, round, model_turns, total_tokens, "Round completed");
            }
            DomainEvent::SessionStateChanged { from, to, .. } => {
                debug!(%from, %to, "Session state changed");
            }
            DomainEvent::ErrorOccurred { context, error_message, .. } => {
                debug!(%context, error = %error_message, "Error reported");
            }
        }
    }
}

fn print_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    SLEUTH_API_KEY       (generic)");
    eprintln!("    OPENROUTER_API_KEY   (for OpenRouter)");
    eprintln!("    OPENAI_API_KEY       (for OpenAI direct)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    eprintln!("  Local servers (ollama, lmstudio, vllm) need no key.");
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn event_log_drains_until_the_bus_is_dropped() {
        let bus = EventBus::new(16);
        let logger = tokio::spawn(log_domain_events(bus.subscribe()));

        bus.publish(DomainEvent::KnowledgeSaved { id: 1, bytes: 42, timestamp: Utc::now() });
        bus.publish(DomainEvent::RoundCompleted {
            conversation_id: "c1".into(),
            round: 1,
            model_turns: 2,
            total_tokens: 300,
            timestamp: Utc::now(),
        });
        drop(bus);

        assert_eq!(logger.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn event_log_survives_lagging() {
        let bus = EventBus::new(2);
        let rx = bus.subscribe();
        for id in 0..5 {
            bus.publish(DomainEvent::KnowledgeSaved { id, bytes: 1, timestamp: Utc::now() });
        }
        drop(bus);

        // Three events were overwritten before the logger started
        assert_eq!(log_domain_events(rx).await, 2);
    }
}

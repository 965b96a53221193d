//! Knowledge tools: let the model record findings and read them back.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use sleuth_core::error::ToolError;
use sleuth_core::event::{DomainEvent, EventBus};
use sleuth_core::knowledge::KnowledgeStore;
use sleuth_core::tool::{ParamType, ParameterSchema, Tool, ToolOutput};
use std::sync::Arc;
use tracing::info;

pub struct SaveKnowledgeTool {
    store: Arc<dyn KnowledgeStore>,
    events: Option<Arc<EventBus>>,
}

impl SaveKnowledgeTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store, events: None }
    }

    /// Publish a `KnowledgeSaved` event for every stored finding.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
impl Tool for SaveKnowledgeTool {
    fn name(&self) -> &str {
        "save_knowledge"
    }

    fn description(&self) -> &str {
        "Save a finding to the knowledge base for later use in the report. \
         Include the source url with every finding."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required("knowledge", ParamType::String, "The finding to store")
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let text = arguments["knowledge"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing required parameter 'knowledge'".into()))?;

        let id = self.store.save(text).await?;
        info!(id, chars = text.len(), "Knowledge saved");
        if let Some(events) = &self.events {
            events.publish(DomainEvent::KnowledgeSaved {
                id,
                bytes: text.len(),
                timestamp: Utc::now(),
            });
        }
        Ok(ToolOutput {
            content: format!("Knowledge {id} saved successfully."),
            data: Some(json!({ "id": id })),
        })
    }
}

pub struct GetAllKnowledgeTool {
    store: Arc<dyn KnowledgeStore>,
}

impl GetAllKnowledgeTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetAllKnowledgeTool {
    fn name(&self) -> &str {
        "get_all_knowledge"
    }

    fn description(&self) -> &str {
        "Return every finding saved so far, oldest first."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolOutput, ToolError> {
        let all = self.store.get_all().await?;
        info!(entries = all.len(), "Knowledge retrieved");
        Ok(ToolOutput::json(json!(all)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_memory::{InMemoryKnowledgeStore, StoreOptions};

    #[tokio::test]
    async fn save_then_get_all() {
        let store: Arc<dyn KnowledgeStore> = Arc::new(InMemoryKnowledgeStore::new());
        let save = SaveKnowledgeTool::new(Arc::clone(&store));
        let get = GetAllKnowledgeTool::new(store);

        let out = save.execute(json!({"knowledge": "fact A"})).await.unwrap();
        assert_eq!(out.content, "Knowledge 0 saved successfully.");
        let out = save.execute(json!({"knowledge": "fact B"})).await.unwrap();
        assert_eq!(out.content, "Knowledge 1 saved successfully.");

        let all = get.execute(json!({})).await.unwrap();
        assert_eq!(all.content, r#"["fact A","fact B"]"#);
    }

    #[tokio::test]
    async fn save_publishes_event() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let save = SaveKnowledgeTool::new(Arc::new(InMemoryKnowledgeStore::new())).with_events(bus);
        save.execute(json!({"knowledge": "fact A"})).await.unwrap();

        match rx.try_recv().unwrap().as_ref() {
            DomainEvent::KnowledgeSaved { id, bytes, .. } => {
                assert_eq!(*id, 0);
                assert_eq!(*bytes, 6);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_store_is_empty_array() {
        let get = GetAllKnowledgeTool::new(Arc::new(InMemoryKnowledgeStore::new()));
        assert_eq!(get.execute(Value::Null).await.unwrap().content, "[]");
    }

    #[tokio::test]
    async fn capacity_error_keeps_its_kind() {
        let store = InMemoryKnowledgeStore::with_options(StoreOptions {
            max_bytes: 32,
            ..StoreOptions::default()
        });
        let save = SaveKnowledgeTool::new(Arc::new(store));
        save.execute(json!({"knowledge": "short"})).await.unwrap();
        let err = save
            .execute(json!({"knowledge": "a much longer finding that will not fit"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "CapacityExceeded");
        assert!(err.to_conversation_string().starts_with("Error: CapacityExceeded — "));
    }
}

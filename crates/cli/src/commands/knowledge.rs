//! `sleuth knowledge`: show the findings of the last session.

use sleuth_config::AppConfig;
use sleuth_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use sleuth_memory::{FileKnowledgeStore, StoreOptions};

pub async fn show(config: &AppConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.knowledge_path();
    let store = FileKnowledgeStore::new(
        path.clone(),
        StoreOptions {
            id_base: config.knowledge.id_base,
            ..StoreOptions::default()
        },
    );
    let entries = store.entries().await?;

    if json {
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        println!("{}", serde_json::to_string_pretty(&texts)?);
        return Ok(());
    }

    println!("📚 Knowledge ({})", path.display());
    println!("{}", render(&entries));
    Ok(())
}

fn render(entries: &[KnowledgeEntry]) -> String {
    if entries.is_empty() {
        return "   No findings stored yet.".into();
    }
    entries
        .iter()
        .map(|e| format!("  [{:>3}] {}", e.id, e.text))
        .collect::<Vec<_>>()
        .join("\n")
}

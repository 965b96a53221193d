//! In-memory knowledge store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use sleuth_core::error::KnowledgeError;
use sleuth_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use tokio::sync::Mutex;

use crate::file_store::StoreOptions;
use crate::format::{self, EntryMap};

/// Same id and capacity rules as the file store, without the file.
pub struct InMemoryKnowledgeStore {
    entries: Mutex<EntryMap>,
    options: StoreOptions,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            entries: Mutex::new(EntryMap::new()),
            options,
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn reset(&self) -> Result<(), KnowledgeError> {
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn save(&self, text: &str) -> Result<u64, KnowledgeError> {
        let mut entries = self.entries.lock().await;
        let id = format::next_id(&entries, self.options.id_base);

        let mut next = entries.clone();
        next.insert(id, text.to_string());
        let attempted = format::encode(&next)?.len() as u64;
        if attempted > self.options.max_bytes {
            return Err(KnowledgeError::CapacityExceeded {
                limit: self.options.max_bytes,
                attempted,
            });
        }

        *entries = next;
        Ok(id)
    }

    async fn entries(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        Ok(format::to_entries(self.entries.lock().await.clone()))
    }

    async fn size_bytes(&self) -> Result<u64, KnowledgeError> {
        let entries = self.entries.lock().await;
        if entries.is_empty() {
            return Ok(0);
        }
        Ok(format::encode(&entries)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_get_all() {
        let store = InMemoryKnowledgeStore::new();
        assert_eq!(store.save("fact A").await.unwrap(), 0);
        assert_eq!(store.save("fact B").await.unwrap(), 1);
        assert_eq!(store.get_all().await.unwrap(), vec!["fact A", "fact B"]);
    }

    #[tokio::test]
    async fn reset_then_get_all_is_empty() {
        let store = InMemoryKnowledgeStore::new();
        store.save("x").await.unwrap();
        store.reset().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
        assert_eq!(store.size_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn capacity_guard() {
        let store = InMemoryKnowledgeStore::with_options(StoreOptions {
            max_bytes: 32,
            ..StoreOptions::default()
        });
        store.save("tiny").await.unwrap();
        assert!(matches!(
            store.save("this one will not fit").await,
            Err(KnowledgeError::CapacityExceeded { limit: 32, .. })
        ));
        assert_eq!(store.get_all().await.unwrap(), vec!["tiny"]);
    }
}

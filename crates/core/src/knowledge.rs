//! KnowledgeStore trait: the research findings log.
//!
//! Findings are numbered by the store, never by the caller. Ids are contiguous
//! from the store's configured base and entries are never edited in place.
//! The whole store is reset at the start of every research session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// A single stored finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Store-assigned id
    pub id: u64,

    /// The finding itself
    pub text: String,
}

/// The core KnowledgeStore trait.
///
/// Implementations: file-backed JSON (durable per save), in-memory (for testing).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Drop every entry and truncate the backing storage.
    async fn reset(&self) -> Result<(), KnowledgeError>;

    /// Append a finding and return the id assigned to it.
    ///
    /// Durable before it returns.
    async fn save(&self, text: &str) -> Result<u64, KnowledgeError>;

    /// All entries ordered by ascending id.
    async fn entries(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError>;

    /// All texts ordered by ascending id.
    async fn get_all(&self) -> Result<Vec<String>, KnowledgeError> {
        Ok(self.entries().await?.into_iter().map(|e| e.text).collect())
    }

    /// Current persisted size in bytes.
    async fn size_bytes(&self) -> Result<u64, KnowledgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serialization() {
        let entry = KnowledgeEntry { id: 3, text: "Rust 1.0 shipped in 2015".into() };
        let json = serde_json::to_string(&entry).unwrap();
        let back: KnowledgeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}

//! Knowledge store implementations for sleuth.

pub mod file_store;
pub mod format;
pub mod in_memory;

pub use file_store::{FileKnowledgeStore, StoreOptions};
pub use in_memory::InMemoryKnowledgeStore;

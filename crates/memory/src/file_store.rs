//! File-backed knowledge store: one JSON document, rewritten per save.
//!
//! Every mutation runs a full read-modify-write cycle under an in-process
//! mutex: load the current file, apply the change, write the new document to
//! a sibling temp file, fsync it, then rename it over the original. Readers
//! take no lock; the rename guarantees they see either the old or the new
//! document, never a partial one.
//!
//! Storage location: `<knowledge_dir>/<filename>` (default
//! `research_knowledge/knowledge.json`).

use async_trait::async_trait;
use sleuth_core::error::KnowledgeError;
use sleuth_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::format::{self, EntryMap};

/// Tunables shared by the store implementations.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Id of the first entry (0 or 1)
    pub id_base: u64,
    /// Encoded size above which saves are refused
    pub max_bytes: u64,
    /// Bounded wait for the write lock
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            id_base: 0,
            max_bytes: 10 * 1024 * 1024,
            lock_timeout: Duration::from_secs(5),
        }
    }
}

pub struct FileKnowledgeStore {
    path: PathBuf,
    options: StoreOptions,
    write_lock: Mutex<()>,
}

impl FileKnowledgeStore {
    pub fn new(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        let path = path.into();
        debug!(path = %path.display(), id_base = options.id_base, "File knowledge store opened");
        Self {
            path,
            options,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, ()>, KnowledgeError> {
        tokio::time::timeout(self.options.lock_timeout, self.write_lock.lock())
            .await
            .map_err(|_| KnowledgeError::LockTimeout {
                waited_ms: self.options.lock_timeout.as_millis() as u64,
            })
    }

    async fn load(&self) -> Result<EntryMap, KnowledgeError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => format::decode(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(EntryMap::new()),
            Err(e) => Err(KnowledgeError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "knowledge.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Durably replace the file with `bytes`.
    async fn persist(&self, bytes: &[u8]) -> Result<(), KnowledgeError> {
        let storage = |what: &str, e: std::io::Error| KnowledgeError::Storage(format!("failed to {what}: {e}"));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage("create knowledge directory", e))?;
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| storage("create temp file", e))?;
        file.write_all(bytes).await.map_err(|e| storage("write temp file", e))?;
        file.sync_all().await.map_err(|e| storage("sync temp file", e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage("replace knowledge file", e))
    }
}

#[async_trait]
impl KnowledgeStore for FileKnowledgeStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn reset(&self) -> Result<(), KnowledgeError> {
        let _guard = self.acquire().await?;
        self.persist(&format::encode(&EntryMap::new())?).await?;
        info!(path = %self.path.display(), "Knowledge store reset");
        Ok(())
    }

    async fn save(&self, text: &str) -> Result<u64, KnowledgeError> {
        let _guard = self.acquire().await?;

        let mut entries = self.load().await?;
        let id = format::next_id(&entries, self.options.id_base);
        entries.insert(id, text.to_string());

        let bytes = format::encode(&entries)?;
        let attempted = bytes.len() as u64;
        if attempted > self.options.max_bytes {
            return Err(KnowledgeError::CapacityExceeded {
                limit: self.options.max_bytes,
                attempted,
            });
        }

        self.persist(&bytes).await?;
        debug!(id, bytes = attempted, "Knowledge entry saved");
        Ok(id)
    }

    async fn entries(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        Ok(format::to_entries(self.load().await?))
    }

    async fn size_bytes(&self) -> Result<u64, KnowledgeError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(KnowledgeError::Storage(e.to_string())),
        }
    }
}

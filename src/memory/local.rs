//! File-backed memory store
//!
//! Records live in one JSON array on disk, rewritten after every mutation.
//! Search ranks by cosine similarity of hashed token embeddings. Once the
//! store holds more than `max_entries` records the oldest are evicted.

use crate::errors::{AlfredError, Result};
use crate::memory::embedding::{cosine, embed};
use crate::memory::store::MemoryStore;
use crate::memory::types::MemoryRecord;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// File name inside the memory directory
pub const LOCAL_STORE_FILE: &str = "memory.json";

pub struct LocalStore {
    path: PathBuf,
    max_entries: usize,
    records: Mutex<VecDeque<MemoryRecord>>,
}

impl LocalStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let records: VecDeque<MemoryRecord> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                VecDeque::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    AlfredError::Memory(format!("corrupt store {}: {}", path.display(), e))
                })?
            }
        } else {
            VecDeque::new()
        };

        debug!(path = %path.display(), entries = records.len(), "Opened local memory store");
        Ok(Self {
            path,
            max_entries: max_entries.max(1),
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &VecDeque<MemoryRecord>) -> Result<()> {
        let json = serde_json::to_string(records)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for LocalStore {
    fn backend(&self) -> &str {
        "local"
    }

    async fn add(&self, record: MemoryRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        records.push_back(record);
        while records.len() > self.max_entries {
            records.pop_front();
        }
        self.persist(&records).await
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let query = embed(text);
        let records = self.records.lock().await;

        let mut scored: Vec<(f32, usize)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (cosine(&query, &embed(&r.document)), i))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        // best score first, newer record first on ties
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, i)| records[i].clone())
            .collect())
    }

    async fn all(&self) -> Result<Vec<MemoryRecord>> {
        Ok(self.records.lock().await.iter().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut records = self.records.lock().await;
        records.clear();
        self.persist(&records).await
    }
}

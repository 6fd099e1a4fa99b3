//! Persistent memory
//!
//! [`MemoryEngine`] wraps a [`MemoryStore`] backend. Engine operations never
//! fail the caller: errors are logged and an empty result is returned.
//! Only construction, export and import report errors.

pub mod chroma;
pub mod embedding;
pub mod local;
pub mod store;
pub mod types;

pub use chroma::ChromaStore;
pub use local::LocalStore;
pub use store::MemoryStore;
pub use types::{ExportEntry, MemoryExport, MemoryRecord, MemoryStats, Metadata};

use crate::config::Config;
use crate::errors::{AlfredError, Result};
use chrono::Utc;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info};

pub struct MemoryEngine {
    store: Box<dyn MemoryStore>,
    queries: AtomicU64,
}

impl MemoryEngine {
    pub fn new(store: Box<dyn MemoryStore>) -> Self {
        Self {
            store,
            queries: AtomicU64::new(0),
        }
    }

    /// Open the backend named by `memory.vector_store`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let memory = &config.memory;
        let store: Box<dyn MemoryStore> = match memory.vector_store.as_str() {
            "local" => Box::new(LocalStore::open(
                config.memory_dir().join(local::LOCAL_STORE_FILE),
                memory.max_memory_size,
            )?),
            "chromadb" => Box::new(
                ChromaStore::connect(
                    &memory.chroma_url,
                    &memory.collection,
                    config.llm.request_timeout_secs,
                )
                .await?,
            ),
            other => {
                return Err(AlfredError::Config(format!("unknown vector store: {}", other)));
            }
        };
        info!(backend = store.backend(), "Memory engine initialized");
        Ok(Self::new(store))
    }

    pub fn backend(&self) -> &str {
        self.store.backend()
    }

    /// Store a prompt/response pair; returns the new id
    pub async fn store_interaction(
        &self,
        prompt: &str,
        response: &str,
        extra: Metadata,
    ) -> Option<String> {
        let mut metadata = Metadata::new();
        metadata.insert("type".into(), json!("interaction"));
        metadata.insert("prompt_length".into(), json!(prompt.chars().count()));
        metadata.insert("response_length".into(), json!(response.chars().count()));
        metadata.insert("created_at".into(), json!(Utc::now().to_rfc3339()));
        metadata.insert("access_count".into(), json!(0));
        metadata.extend(extra);

        let content = format!("Prompt: {}\nResponse: {}", prompt, response);
        self.add(MemoryRecord::new(content, metadata), "interaction").await
    }

    /// Store a standalone fact under `category`
    pub async fn store_fact(&self, fact: &str, category: &str, extra: Metadata) -> Option<String> {
        let mut metadata = Metadata::new();
        metadata.insert("type".into(), json!("fact"));
        metadata.insert("category".into(), json!(category));
        metadata.insert("created_at".into(), json!(Utc::now().to_rfc3339()));
        metadata.insert("access_count".into(), json!(0));
        metadata.extend(extra);

        self.add(MemoryRecord::new(fact, metadata), "fact").await
    }

    async fn add(&self, record: MemoryRecord, kind: &str) -> Option<String> {
        let id = record.id.clone();
        match self.store.add(record).await {
            Ok(()) => {
                debug!(id = %id, kind, "Stored memory");
                Some(id)
            }
            Err(e) => {
                error!(kind, "Failed to store memory: {}", e);
                None
            }
        }
    }

    /// Documents most relevant to `query`
    pub async fn search(&self, query: &str, limit: usize) -> Vec<String> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        match self.store.query(query, limit).await {
            Ok(records) => {
                debug!(results = records.len(), "Memory search");
                records.into_iter().map(|r| r.document).collect()
            }
            Err(e) => {
                error!("Memory search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Newest documents first, by `created_at`
    pub async fn list_recent(&self, limit: usize) -> Vec<String> {
        match self.store.all().await {
            Ok(mut records) => {
                records.sort_by(|a, b| b.created_at().cmp(a.created_at()));
                records.into_iter().take(limit).map(|r| r.document).collect()
            }
            Err(e) => {
                error!("Failed to list recent memories: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn clear(&self) -> bool {
        match self.store.clear().await {
            Ok(()) => {
                info!("Memory cleared successfully");
                true
            }
            Err(e) => {
                error!("Failed to clear memory: {}", e);
                false
            }
        }
    }

    pub async fn stats(&self) -> MemoryStats {
        let count = self.store.count().await;
        if let Err(e) = &count {
            error!("Failed to get memory stats: {}", e);
        }
        MemoryStats {
            backend: self.backend().to_string(),
            healthy: count.is_ok(),
            total: count.unwrap_or(0),
            queries: self.queries.load(Ordering::Relaxed),
        }
    }

    /// `Healthy` or `Unhealthy: <reason>`
    pub async fn is_healthy(&self) -> String {
        match self.store.count().await {
            Ok(_) => "Healthy".to_string(),
            Err(e) => {
                error!("Memory health check failed: {}", e);
                format!("Unhealthy: {}", e)
            }
        }
    }

    /// Write every record to `path` as a JSON export
    pub async fn export(&self, path: &Path) -> Result<usize> {
        let records = self.store.all().await?;
        let export = MemoryExport {
            exported_at: Utc::now(),
            total_entries: records.len(),
            entries: records
                .into_iter()
                .map(|r| ExportEntry {
                    document: r.document,
                    metadata: r.metadata,
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&export)?;
        tokio::fs::write(path, json).await?;
        info!(entries = export.total_entries, "Memory exported to {}", path.display());
        Ok(export.total_entries)
    }

    /// Add every entry of an export file under fresh ids
    pub async fn import(&self, path: &Path) -> Result<usize> {
        let raw = tokio::fs::read_to_string(path).await?;
        let export: MemoryExport = serde_json::from_str(&raw)?;

        let mut imported = 0;
        for entry in export.entries {
            self.store
                .add(MemoryRecord::new(entry.document, entry.metadata))
                .await?;
            imported += 1;
        }
        info!(imported, "Imported memory entries from {}", path.display());
        Ok(imported)
    }
}

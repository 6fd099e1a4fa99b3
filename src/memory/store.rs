//! Vector store abstraction

use crate::errors::Result;
use crate::memory::types::MemoryRecord;
use async_trait::async_trait;

/// Backend holding memory records
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Short backend name for status output
    fn backend(&self) -> &str;

    async fn add(&self, record: MemoryRecord) -> Result<()>;

    /// Up to `limit` records most similar to `text`, best first
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<MemoryRecord>>;

    /// Every stored record, in storage order
    async fn all(&self) -> Result<Vec<MemoryRecord>>;

    async fn count(&self) -> Result<usize>;

    /// Drop every record
    async fn clear(&self) -> Result<()>;
}

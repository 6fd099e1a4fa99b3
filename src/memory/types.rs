//! Memory record and export types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to a memory
pub type Metadata = serde_json::Map<String, Value>;

/// One stored text blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub document: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryRecord {
    pub fn new(document: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document: document.into(),
            metadata,
        }
    }

    /// RFC 3339 creation stamp, empty when absent
    pub fn created_at(&self) -> &str {
        self.metadata
            .get("created_at")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn kind(&self) -> Option<&str> {
        self.metadata.get("type").and_then(Value::as_str)
    }
}

/// Snapshot returned by `memory inspect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub backend: String,
    pub total: usize,
    pub queries: u64,
    pub healthy: bool,
}

/// Export file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryExport {
    pub exported_at: DateTime<Utc>,
    pub total_entries: usize,
    pub entries: Vec<ExportEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEntry {
    pub document: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_created_at_lookup() {
        let mut metadata = Metadata::new();
        metadata.insert("created_at".into(), json!("2024-01-01T00:00:00Z"));
        metadata.insert("type".into(), json!("fact"));
        let record = MemoryRecord::new("sky is blue", metadata);

        assert_eq!(record.created_at(), "2024-01-01T00:00:00Z");
        assert_eq!(record.kind(), Some("fact"));
        assert_eq!(MemoryRecord::new("x", Metadata::new()).created_at(), "");
    }

    #[test]
    fn test_import_tolerates_missing_metadata() {
        let raw = r#"{"exported_at":"2024-01-01T00:00:00Z","total_entries":1,
                      "entries":[{"document":"hello"}]}"#;
        let export: MemoryExport = serde_json::from_str(raw).unwrap();
        assert_eq!(export.entries[0].document, "hello");
        assert!(export.entries[0].metadata.is_empty());
    }
}

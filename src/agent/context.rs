//! Per-task request and bookkeeping

use crate::agent::state::{TaskEvent, TaskState};
use crate::errors::{AlfredError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// What the caller asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub prompt: String,
    /// Model alias; None uses `llm.default_model`
    pub model: Option<String>,
    pub use_memory: bool,
    pub enable_plugins: bool,
    pub verbose: bool,
}

impl TaskRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            use_memory: true,
            enable_plugins: true,
            verbose: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_memory(mut self, use_memory: bool) -> Self {
        self.use_memory = use_memory;
        self
    }

    pub fn with_plugins(mut self, enable_plugins: bool) -> Self {
        self.enable_plugins = enable_plugins;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Live record of one task
#[derive(Debug, Clone, Serialize)]
pub struct TaskContext {
    pub task_id: String,
    pub prompt: String,
    pub model: String,
    pub use_memory: bool,
    pub enable_plugins: bool,
    pub verbose: bool,
    pub created_at: DateTime<Utc>,
    pub state: TaskState,
    pub metadata: HashMap<String, Value>,
}

impl TaskContext {
    pub fn new(request: &TaskRequest, default_model: &str) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            prompt: request.prompt.clone(),
            model: request
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            use_memory: request.use_memory,
            enable_plugins: request.enable_plugins,
            verbose: request.verbose,
            created_at: Utc::now(),
            state: TaskState::Created,
            metadata: HashMap::new(),
        }
    }

    /// Apply `event`, leaving the state untouched on an invalid transition
    pub fn advance(&mut self, event: TaskEvent) -> Result<()> {
        let next = self.state.transition(event)?;
        debug!(task_id = %self.task_id, from = ?self.state, to = ?next, "Task transition");
        self.state = next;
        Ok(())
    }

    /// Record success metadata and enter `Completed`
    pub fn complete(&mut self, response: &str, model_used: &str) -> Result<()> {
        self.advance(TaskEvent::Complete)?;
        self.metadata.insert("status".into(), json!("completed"));
        self.metadata
            .insert("response_length".into(), json!(response.chars().count()));
        self.metadata.insert("model_used".into(), json!(model_used));
        Ok(())
    }

    /// Record the error and enter `Failed` (no-op for terminal states)
    pub fn fail(&mut self, error: &AlfredError) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TaskState::Failed;
        self.metadata.insert("status".into(), json!("failed"));
        self.metadata.insert("error".into(), json!(error.to_string()));
    }

    pub fn status(&self) -> Option<&str> {
        self.metadata.get("status").and_then(Value::as_str)
    }

    /// First 100 characters of the prompt, for log lines
    pub fn prompt_preview(&self) -> String {
        let preview: String = self.prompt.chars().take(100).collect();
        if preview.len() < self.prompt.len() {
            format!("{}...", preview)
        } else {
            preview
        }
    }
}

//! Type definitions for model routing and provider wire formats

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse task category used for model preference lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Coding,
    Reasoning,
    Creative,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Coding, TaskType::Reasoning, TaskType::Creative];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Coding => "coding",
            TaskType::Reasoning => "reasoning",
            TaskType::Creative => "creative",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coding" => Ok(TaskType::Coding),
            "reasoning" => Ok(TaskType::Reasoning),
            "creative" => Ok(TaskType::Creative),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

/// Router view of one available provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub available: bool,
    /// Task types whose preference resolves to this provider
    pub preferred_for: Vec<TaskType>,
}

/// Sampling parameters shared by every provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSettings {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.1,
        }
    }
}

/// Anthropic Messages API response (text blocks only)
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// OpenAI Chat Completions response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Response from Ollama /api/generate with `stream: false`
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

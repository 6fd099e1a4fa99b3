//! LLM providers and routing
//!
//! - `claude` via the Anthropic Messages API
//! - `openai` (alias `gpt4`) via Chat Completions
//! - `ollama` via a local Ollama server
//!
//! `gemini` is a recognised alias with no provider behind it.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod router;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::ModelProvider;
pub use router::{classify_task, provider_for, ModelRouter};
pub use types::{ModelInfo, TaskType};

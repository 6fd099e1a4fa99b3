//! Model router
//!
//! Picks a provider per prompt and executes with fallback. Providers are
//! kept in registration order; that order decides both the "first
//! available" fallback and the order alternatives are tried after a
//! failure. Each alternative is tried at most once.

use crate::config::{ApiKeys, LlmConfig};
use crate::errors::{AlfredError, Result};
use crate::models::anthropic::AnthropicProvider;
use crate::models::ollama::OllamaProvider;
use crate::models::openai::OpenAiProvider;
use crate::models::provider::ModelProvider;
use crate::models::types::{ModelInfo, TaskType};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

const CODING_KEYWORDS: &[&str] = &[
    "code", "program", "function", "debug", "api", "sql", "python", "javascript",
];
const REASONING_KEYWORDS: &[&str] = &[
    "analyze", "reason", "logic", "problem", "solve", "strategy", "plan",
];
const CREATIVE_KEYWORDS: &[&str] = &[
    "write", "create", "story", "poem", "creative", "brainstorm", "imagine",
];

/// Preference used when a task type has no configured entry
pub const DEFAULT_PREFERENCE: &str = "claude";

/// Classify by keyword membership; coding wins over reasoning over creative
pub fn classify_task(prompt: &str) -> TaskType {
    let lower = prompt.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if mentions(CODING_KEYWORDS) {
        TaskType::Coding
    } else if mentions(REASONING_KEYWORDS) {
        TaskType::Reasoning
    } else if mentions(CREATIVE_KEYWORDS) {
        TaskType::Creative
    } else {
        TaskType::Reasoning
    }
}

/// Map a model alias to its provider name
pub fn provider_for(model: &str) -> Option<&'static str> {
    match model.to_lowercase().as_str() {
        "claude" => Some("claude"),
        "gpt4" | "openai" => Some("openai"),
        "gemini" => Some("gemini"),
        "ollama" => Some("ollama"),
        _ => None,
    }
}

/// Built-in preference table
pub fn default_preferences() -> HashMap<TaskType, String> {
    HashMap::from([
        (TaskType::Reasoning, "claude".to_string()),
        (TaskType::Coding, "gpt4".to_string()),
        (TaskType::Creative, "gemini".to_string()),
    ])
}

/// Routes prompts to registered providers
pub struct ModelRouter {
    providers: Vec<Arc<dyn ModelProvider>>,
    preferences: HashMap<TaskType, String>,
}

impl ModelRouter {
    /// Empty router with the default preference table
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            preferences: default_preferences(),
        }
    }

    /// Overlay `task type → model` entries on the defaults; unknown task types are ignored
    pub fn with_preferences(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (task, model) in overrides {
            match task.parse::<TaskType>() {
                Ok(task) => {
                    self.preferences.insert(task, model.clone());
                }
                Err(e) => warn!("Ignoring model preference: {}", e),
            }
        }
        self
    }

    /// Register providers for which credentials are present
    pub fn from_config(config: &LlmConfig, keys: &ApiKeys) -> Self {
        let mut router = Self::new().with_preferences(&config.model_preferences);

        if let Some(key) = &keys.openai {
            match OpenAiProvider::new(key.clone(), config) {
                Ok(p) => {
                    router.register(Arc::new(p));
                    info!("OpenAI client initialized");
                }
                Err(e) => warn!("Failed to initialize OpenAI client: {}", e),
            }
        }
        if let Some(key) = &keys.claude {
            match AnthropicProvider::new(key.clone(), config) {
                Ok(p) => {
                    router.register(Arc::new(p));
                    info!("Claude client initialized");
                }
                Err(e) => warn!("Failed to initialize Claude client: {}", e),
            }
        }
        if keys.gemini.is_some() {
            warn!("GEMINI_API_KEY is set but Gemini is not supported; ignoring");
        }
        if config.ollama.enabled {
            match OllamaProvider::new(config) {
                Ok(p) => {
                    router.register(Arc::new(p));
                    info!(url = %config.ollama.url, "Ollama client initialized");
                }
                Err(e) => warn!("Failed to initialize Ollama client: {}", e),
            }
        }

        info!(providers = router.providers.len(), "LLM router initialized");
        router
    }

    /// Append a provider, replacing any existing one with the same name
    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        let name = provider.name().to_string();
        if let Some(slot) = self.providers.iter_mut().find(|p| p.name() == name) {
            *slot = provider;
        } else {
            self.providers.push(provider);
        }
    }

    fn provider(&self, name: &str) -> Option<&Arc<dyn ModelProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Provider names in registration order
    pub fn available_models(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Whether `model` (an alias or provider name) resolves to a registered provider
    pub fn is_model_available(&self, model: &str) -> bool {
        provider_for(model)
            .map(|name| self.provider(name).is_some())
            .unwrap_or(false)
    }

    /// Pick a provider name for this prompt
    ///
    /// An explicit request wins when available; otherwise the prompt's task
    /// type picks a preference; otherwise the first registered provider.
    pub fn select_model(&self, requested: &str, prompt: &str) -> Result<String> {
        if !requested.eq_ignore_ascii_case("auto") {
            if let Some(name) = provider_for(requested).filter(|n| self.provider(n).is_some()) {
                return Ok(name.to_string());
            }
            warn!(model = %requested, "Requested model not available, falling back to auto selection");
        }

        let task_type = classify_task(prompt);
        let preferred = self
            .preferences
            .get(&task_type)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PREFERENCE);
        if let Some(name) = provider_for(preferred).filter(|n| self.provider(n).is_some()) {
            return Ok(name.to_string());
        }

        match self.providers.first() {
            Some(p) => {
                info!(model = %p.name(), task_type = %task_type, "Using fallback model");
                Ok(p.name().to_string())
            }
            None => Err(AlfredError::NoProviderAvailable),
        }
    }

    /// Run `prompt` on `model`, trying each other provider once on failure
    pub async fn execute(&self, model: &str, prompt: &str) -> Result<String> {
        if self.providers.is_empty() {
            return Err(AlfredError::NoProviderAvailable);
        }

        let primary = provider_for(model).and_then(|name| self.provider(name));
        let mut last_error = match primary {
            Some(p) => match p.complete(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) => e,
            },
            None => AlfredError::UnsupportedModel(model.to_string()),
        };
        error!(model = %model, "Model execution failed: {}", last_error);

        let primary_name = primary.map(|p| p.name().to_string());
        for fallback in &self.providers {
            if Some(fallback.name()) == primary_name.as_deref() {
                continue;
            }
            info!(model = %fallback.name(), "Trying fallback model");
            match fallback.complete(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    error!(model = %fallback.name(), "Fallback model failed: {}", e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// `Available models: a, b` or `Available models: None`
    pub fn get_status(&self) -> String {
        let models = self.available_models();
        if models.is_empty() {
            "Available models: None".to_string()
        } else {
            format!("Available models: {}", models.join(", "))
        }
    }

    /// Registered providers with the task types preferring them
    pub fn get_model_info(&self) -> Vec<ModelInfo> {
        self.providers
            .iter()
            .map(|p| {
                let mut preferred_for: Vec<TaskType> = self
                    .preferences
                    .iter()
                    .filter(|(_, model)| provider_for(model) == Some(p.name()))
                    .map(|(task, _)| *task)
                    .collect();
                preferred_for.sort();
                ModelInfo {
                    name: p.name().to_string(),
                    available: true,
                    preferred_for,
                }
            })
            .collect()
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new()
    }
}

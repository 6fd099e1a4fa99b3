//! Configuration management for Alfred
//!
//! TOML-backed settings with defaults, validation and dotted-key access.
//! Location: ~/.alfred/config.toml
//!
//! Credentials never live in the file; they are read from the environment
//! (optionally seeded from a `.env` file).

use crate::errors::{AlfredError, Result};
use crate::logging::parse_level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Complete configuration for Alfred
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub memory: MemoryConfig,
    pub llm: LlmConfig,
    pub plugins: PluginsConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

/// Memory store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub persist_path: String,
    /// `local` or `chromadb`
    pub vector_store: String,
    pub chroma_url: String,
    pub collection: String,
    pub max_memory_size: usize,
}

/// Model routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub default_model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout_secs: u64,
    pub anthropic_url: String,
    pub anthropic_model: String,
    pub openai_url: String,
    pub openai_model: String,
    /// Task type (`coding`, `reasoning`, `creative`) to model name
    pub model_preferences: BTreeMap<String, String>,
    pub ollama: OllamaConfig,
}

/// Local Ollama provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub url: String,
    pub model: String,
}

/// Plugin execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub enabled: bool,
    pub plugin_dir: String,
    /// Wall-clock limit for one plugin call, seconds
    pub sandbox_timeout: u64,
    /// Wall-clock limit for `execute:` shell commands, seconds
    pub shell_timeout: u64,
}

/// Task bookkeeping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Completed tasks kept for status reporting (oldest evicted first)
    pub max_completed_tasks: usize,
    /// Memories pulled into the prompt per task
    pub context_memories: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            persist_path: "~/.alfred/memory".to_string(),
            vector_store: "local".to_string(),
            chroma_url: "http://localhost:8000".to_string(),
            collection: "alfred_memory".to_string(),
            max_memory_size: 1_000_000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut model_preferences = BTreeMap::new();
        model_preferences.insert("reasoning".to_string(), "claude".to_string());
        model_preferences.insert("coding".to_string(), "gpt4".to_string());
        model_preferences.insert("creative".to_string(), "gemini".to_string());

        Self {
            default_model: "auto".to_string(),
            max_tokens: 4000,
            temperature: 0.1,
            request_timeout_secs: 120,
            anthropic_url: "https://api.anthropic.com".to_string(),
            anthropic_model: "claude-3-sonnet-20240229".to_string(),
            openai_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4".to_string(),
            model_preferences,
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plugin_dir: "~/.alfred/plugins".to_string(),
            sandbox_timeout: 300,
            shell_timeout: 30,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_completed_tasks: 1000,
            context_memories: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.plugins.sandbox_timeout == 0 {
            return Err(AlfredError::Config(
                "plugins.sandbox_timeout must be greater than 0".to_string(),
            ));
        }

        if self.plugins.shell_timeout == 0 {
            return Err(AlfredError::Config(
                "plugins.shell_timeout must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(AlfredError::Config(
                "llm.max_tokens must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AlfredError::Config(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        match self.memory.vector_store.as_str() {
            "local" | "chromadb" => {}
            other => {
                return Err(AlfredError::Config(format!(
                    "Unknown vector store: {} (expected local or chromadb)",
                    other
                )))
            }
        }

        parse_level(&self.logging.level)?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Memory persistence directory
    pub fn memory_dir(&self) -> PathBuf {
        Self::expand_path(&self.memory.persist_path)
    }

    /// Plugin root directory
    pub fn plugin_dir(&self) -> PathBuf {
        Self::expand_path(&self.plugins.plugin_dir)
    }

    /// Log file, if file logging is configured
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.file_path.as_deref().map(Self::expand_path)
    }
}

/// API credentials read from the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub claude: Option<String>,
    pub gemini: Option<String>,
}

impl ApiKeys {
    /// Read `OPENAI_API_KEY`, `CLAUDE_API_KEY` (or `ANTHROPIC_API_KEY`) and `GEMINI_API_KEY`
    pub fn from_env() -> Self {
        Self {
            openai: non_empty_env("OPENAI_API_KEY"),
            claude: non_empty_env("CLAUDE_API_KEY").or_else(|| non_empty_env("ANTHROPIC_API_KEY")),
            gemini: non_empty_env("GEMINI_API_KEY"),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// File-backed configuration with dotted-key access
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
    /// Why the file on disk was ignored, if it was
    fallback: Option<String>,
}

impl ConfigStore {
    /// Load from `path` (or the default location), writing defaults if missing
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => Self::default_path(),
        };

        if !path.exists() {
            let store = Self {
                path,
                config: Config::default(),
                fallback: None,
            };
            store.save()?;
            info!(path = %store.path.display(), "wrote default configuration");
            return Ok(store);
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| AlfredError::Config(format!("Failed to read config: {}", e)))?;

        // The file is left as-is so `set` and `reset` can still rewrite it.
        let (config, fallback) = match Self::parse(&contents) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded configuration");
                (config, None)
            }
            Err(e) => {
                warn!(path = %path.display(), "{}; using defaults", e);
                (Config::default(), Some(e.to_string()))
            }
        };

        Ok(Self {
            path,
            config,
            fallback,
        })
    }

    /// Parse and validate a TOML document
    pub fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| AlfredError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a store around an in-memory config without touching disk
    pub fn in_memory(path: PathBuf, config: Config) -> Self {
        Self {
            path,
            config,
            fallback: None,
        }
    }

    /// Error that made `load` fall back to defaults
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// ~/.alfred/config.toml, or ./.alfred/config.toml without a home directory
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".alfred")
            .join("config.toml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(&self.config)
            .map_err(|e| AlfredError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AlfredError::Config(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(&self.path, contents)
            .map_err(|e| AlfredError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Look up a value by dotted key, e.g. `plugins.sandbox_timeout`
    pub fn get(&self, key: &str) -> Option<toml::Value> {
        let root = toml::Value::try_from(&self.config).ok()?;
        lookup(&root, key).cloned()
    }

    /// Set a value by dotted key and persist
    ///
    /// The raw string is typed after the value it replaces (strings stay
    /// strings); new keys are inferred as bool, integer, float, then string.
    /// The result must still deserialize and validate, and the key must be
    /// one the config actually models.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(AlfredError::Config(format!("Invalid key: {}", key)));
        }
        let Some((last, parents)) = parts.split_last() else {
            return Err(AlfredError::Config(format!("Invalid key: {}", key)));
        };

        let mut root = toml::Value::try_from(&self.config)
            .map_err(|e| AlfredError::Config(format!("Failed to serialize config: {}", e)))?;

        let mut table = root
            .as_table_mut()
            .ok_or_else(|| AlfredError::Config("Config root is not a table".to_string()))?;

        for part in parents {
            table = table
                .entry(part.to_string())
                .or_insert(toml::Value::Table(toml::map::Map::new()))
                .as_table_mut()
                .ok_or_else(|| AlfredError::Config(format!("{} is not a section", part)))?;
        }

        let value = parse_value(raw, table.get(*last));
        table.insert(last.to_string(), value);

        let updated: Config = root
            .try_into()
            .map_err(|e| AlfredError::Config(format!("Invalid value for {}: {}", key, e)))?;
        updated.validate()?;

        let check = toml::Value::try_from(&updated)
            .map_err(|e| AlfredError::Config(format!("Failed to serialize config: {}", e)))?;
        if lookup(&check, key).is_none() {
            return Err(AlfredError::Config(format!("Unknown configuration key: {}", key)));
        }

        self.config = updated;
        self.save()?;
        self.fallback = None;
        info!(key, "configuration updated");
        Ok(())
    }

    /// Delete the file and restore defaults
    pub fn reset(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        self.config = Config::default();
        self.save()?;
        self.fallback = None;
        info!(path = %self.path.display(), "configuration reset to defaults");
        Ok(())
    }

    /// All settings flattened to `(dotted.key, value)` pairs
    pub fn items(&self) -> Vec<(String, String)> {
        let mut items = Vec::new();
        if let Ok(root) = toml::Value::try_from(&self.config) {
            flatten("", &root, &mut items);
        }
        items
    }
}

fn lookup<'a>(root: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(root, |value, part| value.as_table().and_then(|t| t.get(part)))
}

fn parse_value(raw: &str, existing: Option<&toml::Value>) -> toml::Value {
    match existing {
        Some(toml::Value::String(_)) => toml::Value::String(raw.to_string()),
        Some(toml::Value::Array(_)) => toml::Value::Array(
            raw.split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        ),
        _ => {
            if let Ok(b) = raw.parse::<bool>() {
                toml::Value::Boolean(b)
            } else if let Ok(i) = raw.parse::<i64>() {
                toml::Value::Integer(i)
            } else if let Ok(f) = raw.parse::<f64>() {
                toml::Value::Float(f)
            } else {
                toml::Value::String(raw.to_string())
            }
        }
    }
}

/// Render a leaf value the way a user typed it
pub fn display_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (k, v) in table {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&key, v, out);
            }
        }
        leaf => out.push((prefix.to_string(), display_value(leaf))),
    }
}

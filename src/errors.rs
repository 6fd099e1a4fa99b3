//! Error types for Alfred
//!
//! One error enum for the whole library. Plugin invocation failures get
//! their own variants so callers can tell "unknown plugin" apart from
//! "plugin disabled" without string matching.

use thiserror::Error;

/// Main error type for the Alfred orchestration shell
#[derive(Error, Debug)]
pub enum AlfredError {
    /// No plugin registered under this name
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// Plugin is registered but disabled
    #[error("Plugin not enabled: {0}")]
    PluginNotEnabled(String),

    /// Plugin is enabled but its module failed to load
    #[error("Plugin module not loaded: {0}")]
    PluginNotLoaded(String),

    /// Plugin does not expose the requested method
    #[error("Method {method} not found in plugin {plugin}")]
    MethodNotFound { plugin: String, method: String },

    /// Wall-clock deadline exceeded
    #[error("Plugin execution timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Manifest read/parse errors
    #[error("Invalid plugin manifest: {0}")]
    Manifest(String),

    /// Failure raised inside plugin code or a spawned command
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Task state machine misuse
    #[error("Invalid task transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Provider returned an error or an unexpected payload
    #[error("Model provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },

    /// Nothing configured to route to
    #[error("No LLM models available - check API key configuration")]
    NoProviderAvailable,

    /// Model name that no provider implements
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Vector store errors
    #[error("Memory store error: {0}")]
    Memory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Alfred operations
pub type Result<T> = std::result::Result<T, AlfredError>;

impl AlfredError {
    /// Shorthand for provider failures
    pub fn provider(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        AlfredError::Provider {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// True for the four "cannot dispatch" kinds raised before plugin code runs
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            AlfredError::PluginNotFound(_)
                | AlfredError::PluginNotEnabled(_)
                | AlfredError::PluginNotLoaded(_)
                | AlfredError::MethodNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AlfredError::MethodNotFound {
            plugin: "calculator".to_string(),
            method: "divide".to_string(),
        };
        assert_eq!(err.to_string(), "Method divide not found in plugin calculator");
    }

    #[test]
    fn test_timeout_display() {
        let err = AlfredError::Timeout { duration_ms: 300_000 };
        assert!(err.to_string().contains("timed out after 300000ms"));
    }

    #[test]
    fn test_dispatch_error_classification() {
        assert!(AlfredError::PluginNotFound("x".into()).is_dispatch_error());
        assert!(AlfredError::PluginNotEnabled("x".into()).is_dispatch_error());
        assert!(AlfredError::PluginNotLoaded("x".into()).is_dispatch_error());
        assert!(!AlfredError::Timeout { duration_ms: 1 }.is_dispatch_error());
        assert!(!AlfredError::Execution("boom".into()).is_dispatch_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AlfredError = io.into();
        assert!(matches!(err, AlfredError::Io(_)));
    }
}

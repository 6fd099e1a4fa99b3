//! Plugin types and the plugin capability contract
//!
//! A plugin package is a directory holding `manifest.json` plus an entry
//! file. The manifest is the registry's source of truth; the loaded module
//! is anything implementing [`Plugin`].

use crate::errors::{AlfredError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// File name every plugin directory must contain
pub const MANIFEST_FILE: &str = "manifest.json";

/// Named string arguments passed to a plugin method
pub type PluginArgs = BTreeMap<String, String>;

/// On-disk plugin descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique registry key, also the install directory name
    pub name: String,

    pub version: String,

    pub description: String,

    /// Entry file, relative to the plugin directory
    pub entry_point: String,

    /// Capability strings (recorded, not enforced)
    pub permissions: Vec<String>,

    pub dependencies: Vec<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Methods exposed by a script entry point
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl PluginManifest {
    /// Read and validate a manifest file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AlfredError::Manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        let manifest: PluginManifest = serde_json::from_str(&raw)
            .map_err(|e| AlfredError::Manifest(format!("{}: {}", path.display(), e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Persist as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject names that cannot double as a directory name
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AlfredError::Manifest("plugin name must not be empty".into()));
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(AlfredError::Manifest(format!(
                "plugin name '{}' is not a valid directory name",
                self.name
            )));
        }
        if self.entry_point.trim().is_empty() {
            return Err(AlfredError::Manifest(format!(
                "plugin '{}' has an empty entry_point",
                self.name
            )));
        }
        Ok(())
    }
}

/// Capability contract for a loaded plugin module
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Methods this module can be asked to run
    fn methods(&self) -> Vec<String>;

    fn has_method(&self, method: &str) -> bool {
        self.methods().iter().any(|m| m == method)
    }

    /// Run `method` with named arguments, returning its textual result
    async fn call(&self, method: &str, args: &PluginArgs) -> Result<String>;
}

/// Builds a module from its manifest and resolved entry file
pub type PluginFactory =
    Arc<dyn Fn(&PluginManifest, &Path) -> Result<Arc<dyn Plugin>> + Send + Sync>;

/// Native plugin constructors, keyed by manifest name
#[derive(Clone, Default)]
pub struct PluginTable {
    factories: HashMap<String, PluginFactory>,
}

impl PluginTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for plugins named `name`
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&PluginManifest, &Path) -> Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<PluginFactory> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Invocation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStats {
    pub total_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub timeouts: usize,
    /// Failures raised before plugin code ran (unknown, disabled, ...)
    pub rejected_calls: usize,
    pub total_duration_ms: u64,
}

impl PluginStats {
    /// Record one finished invocation
    pub fn record(&mut self, outcome: &Result<String>, duration_ms: u64) {
        self.total_calls += 1;
        self.total_duration_ms += duration_ms;
        match outcome {
            Ok(_) => self.successful_calls += 1,
            Err(AlfredError::Timeout { .. }) => {
                self.failed_calls += 1;
                self.timeouts += 1;
            }
            Err(e) if e.is_dispatch_error() => {
                self.failed_calls += 1;
                self.rejected_calls += 1;
            }
            Err(_) => self.failed_calls += 1,
        }
    }

    /// Success rate in [0, 1]; 0 when nothing ran yet
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.successful_calls as f64 / self.total_calls as f64
        }
    }
}

//! Plugin executor
//!
//! Invokes plugin methods under a wall-clock deadline. Invocations pass
//! through a one-permit semaphore so at most one timed call is outstanding;
//! the permit is dropped whether the call succeeds, fails or times out.

use crate::config::Config;
use crate::errors::{AlfredError, Result};
use crate::tools::dispatch::{parse_tool_call, scan_directives, Directive};
use crate::tools::implementations::{run_shell_command, SHELL_TIMEOUT_SECS};
use crate::tools::registry::PluginRegistry;
use crate::tools::types::{Plugin, PluginArgs, PluginStats, PluginTable};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Timed plugin calls allowed at once
pub const MAX_CONCURRENT_INVOCATIONS: usize = 1;

/// Default plugin deadline in seconds
pub const DEFAULT_PLUGIN_TIMEOUT_SECS: u64 = 300;

/// Registry plus timed invocation
pub struct PluginExecutor {
    registry: PluginRegistry,
    gate: Arc<Semaphore>,
    timeout: Duration,
    shell_timeout: Duration,
    stats: Mutex<PluginStats>,
}

impl PluginExecutor {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            gate: Arc::new(Semaphore::new(MAX_CONCURRENT_INVOCATIONS)),
            timeout: Duration::from_secs(DEFAULT_PLUGIN_TIMEOUT_SECS),
            shell_timeout: Duration::from_secs(SHELL_TIMEOUT_SECS),
            stats: Mutex::new(PluginStats::default()),
        }
    }

    /// Build from the `plugins` config section
    pub fn from_config(config: &Config, table: PluginTable) -> Result<Self> {
        let registry = PluginRegistry::new(config.plugin_dir(), table)?;
        Ok(Self::new(registry)
            .with_timeout(Duration::from_secs(config.plugins.sandbox_timeout))
            .with_shell_timeout(Duration::from_secs(config.plugins.shell_timeout)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shell_timeout(mut self, timeout: Duration) -> Self {
        self.shell_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list_plugins(&self) -> BTreeMap<String, bool> {
        self.registry.list()
    }

    pub fn list_available_plugins(&self) -> Vec<String> {
        self.registry.available()
    }

    pub fn toggle_plugin(&mut self, name: &str, enabled: bool) -> bool {
        self.registry.toggle(name, enabled)
    }

    pub fn install_plugin(&mut self, source: &Path) -> bool {
        self.registry.install(source)
    }

    /// Invoke `name.method(args)` under the deadline
    pub async fn execute_plugin(
        &self,
        name: &str,
        method: &str,
        args: &PluginArgs,
    ) -> Result<String> {
        let start = Instant::now();
        let outcome = self.invoke(name, method, args).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(_) => debug!(plugin = %name, method, elapsed_ms, "Plugin call succeeded"),
            Err(e) if e.is_dispatch_error() => {
                warn!(plugin = %name, method, "Plugin call rejected: {}", e)
            }
            Err(e) => error!(plugin = %name, method, elapsed_ms, "Plugin call failed: {}", e),
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.record(&outcome, elapsed_ms);
        }
        outcome
    }

    async fn invoke(&self, name: &str, method: &str, args: &PluginArgs) -> Result<String> {
        let plugin = self.resolve(name, method)?;

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| AlfredError::Execution("plugin gate closed".into()))?;

        match timeout(self.timeout, plugin.call(method, args)).await {
            Ok(result) => result,
            Err(_) => Err(AlfredError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Distinguish unknown, disabled, unloaded and missing-method cases
    fn resolve(&self, name: &str, method: &str) -> Result<Arc<dyn Plugin>> {
        let manifest = self
            .registry
            .manifest(name)
            .ok_or_else(|| AlfredError::PluginNotFound(name.to_string()))?;
        if !manifest.enabled {
            return Err(AlfredError::PluginNotEnabled(name.to_string()));
        }
        let plugin = self
            .registry
            .module(name)
            .ok_or_else(|| AlfredError::PluginNotLoaded(name.to_string()))?;
        if !plugin.has_method(method) {
            return Err(AlfredError::MethodNotFound {
                plugin: name.to_string(),
                method: method.to_string(),
            });
        }
        Ok(plugin)
    }

    /// Run every directive found in a model reply
    ///
    /// Returns None when the reply holds no directive. Failures become text
    /// inside the result, never errors.
    pub async fn execute_from_response(&self, response: &str) -> Option<String> {
        let directives = scan_directives(response);
        if directives.is_empty() {
            return None;
        }

        let scratch = std::env::temp_dir();
        let mut blocks = Vec::with_capacity(directives.len());

        for directive in directives {
            let block = match directive {
                Directive::Execute(command) => {
                    let output =
                        run_shell_command(&command, self.shell_timeout.as_secs(), &scratch).await;
                    format!("Command: {}\nOutput: {}", command, output)
                }
                Directive::Search(query) => {
                    let results = format!("Web search for '{}' would be executed here", query);
                    format!("Search: {}\nResults: {}", query, results)
                }
                Directive::Tool(call) => {
                    let result = self.run_tool_call(&call).await;
                    format!("Tool: {}\nResult: {}", call, result)
                }
            };
            blocks.push(block);
        }

        info!(count = blocks.len(), "Executed directives from model reply");
        Some(blocks.join("\n\n"))
    }

    async fn run_tool_call(&self, call: &str) -> String {
        let Some(parsed) = parse_tool_call(call) else {
            return "Error: Invalid tool call format".to_string();
        };
        match self
            .execute_plugin(&parsed.plugin, &parsed.method, &parsed.args)
            .await
        {
            Ok(result) => result,
            Err(e) => format!("Tool execution error: {}", e),
        }
    }

    pub fn stats(&self) -> PluginStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// One-line summary for `alfred status`
    pub fn get_status(&self) -> String {
        let stats = self.stats();
        format!(
            "Plugins: {}/{} enabled, {} calls ({} failed)",
            self.registry.enabled_count(),
            self.registry.len(),
            stats.total_calls,
            stats.failed_calls
        )
    }
}

//! Plugin system
//!
//! - Manifest discovery, toggling and install (registry)
//! - Timed, serialized invocation (executor)
//! - Directive scanning over model replies (dispatch)
//! - Script runtime and shell runner (implementations)

pub mod dispatch;
pub mod executor;
pub mod implementations;
pub mod registry;
pub mod security;
pub mod types;

pub use dispatch::{has_plugin_indicators, parse_tool_call, Directive, ToolCall};
pub use executor::PluginExecutor;
pub use implementations::ScriptPlugin;
pub use registry::{PluginEntry, PluginRegistry};
pub use security::EntryJail;
pub use types::{Plugin, PluginArgs, PluginManifest, PluginStats, PluginTable, MANIFEST_FILE};

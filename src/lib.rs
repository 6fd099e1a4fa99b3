//! Alfred - personal assistant orchestration shell
//!
//! Accepts a natural-language task, pulls relevant prior interactions from a
//! vector memory store, routes the task to a hosted LLM, runs plugin tools
//! named in the reply and stores the interaction back into memory.
//!
//! # Architecture
//!
//! - [`config`]: TOML settings with dotted-key access, env credentials
//! - [`memory`]: memory engine over local or ChromaDB stores
//! - [`models`]: provider trait and router with fallback
//! - [`tools`]: plugin registry, timed executor, directive dispatch
//! - [`agent`]: task state machine and orchestrator

pub mod agent;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod models;
pub mod tools;

pub use agent::{TaskContext, TaskOrchestrator, TaskRequest, TaskState};
pub use config::{ApiKeys, Config, ConfigStore};
pub use errors::{AlfredError, Result};
pub use memory::MemoryEngine;
pub use models::{ModelProvider, ModelRouter};
pub use tools::{Plugin, PluginExecutor, PluginRegistry, PluginTable};

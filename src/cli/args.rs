//! Command-line argument parsing for Alfred
//!
//! Provides the clap-based command surface: task, memory, plugin, status
//! and config.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Alfred - personal assistant orchestration shell
#[derive(Parser, Debug)]
#[command(name = "alfred")]
#[command(version)]
#[command(about = "Memory-backed task orchestration over hosted LLMs with plugin tools", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.alfred/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a task through the orchestrator
    Task(TaskArgs),

    /// Manage persistent memory
    #[command(subcommand)]
    Memory(MemoryCommand),

    /// Manage plugins
    #[command(subcommand)]
    Plugin(PluginCommand),

    /// Show system status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TaskArgs {
    /// Task description or query
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Model to use (auto, claude, gpt4, openai, gemini, ollama)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not read or write memory
    #[arg(long)]
    pub no_memory: bool,

    /// Do not execute plugin directives
    #[arg(long)]
    pub no_plugins: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MemoryCommand {
    /// Search memory
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// List recent memories
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Delete every memory
    Clear,
    /// Show memory statistics
    Inspect,
    /// Write all memories to a JSON file
    Export { path: PathBuf },
    /// Add memories from a JSON export
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PluginCommand {
    /// List plugins and whether they are enabled
    List,
    /// Enable a plugin
    Enable { name: String },
    /// Disable a plugin
    Disable { name: String },
    /// Install a plugin from a directory
    Install { path: PathBuf },
    /// Write the sample calculator plugin
    Sample,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show all settings, or one dotted key
    Show { key: Option<String> },
    /// Set a dotted key
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
}

impl Args {
    /// Log level implied by flags, if any
    pub fn log_level_override(&self) -> Option<&'static str> {
        self.verbose.then_some("debug")
    }
}

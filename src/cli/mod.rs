//! CLI module for Alfred
//!
//! Argument parsing and interactive confirmation.

pub mod args;
pub mod prompt;

pub use args::{Args, Commands, ConfigCommand, MemoryCommand, PluginCommand, TaskArgs};
pub use prompt::confirm;

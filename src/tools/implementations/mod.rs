//! Built-in plugin runtimes

pub mod process;
pub mod sample;
pub mod script;

pub use process::{run_shell_command, SHELL_TIMEOUT_SECS};
pub use sample::write_sample_plugins;
pub use script::ScriptPlugin;

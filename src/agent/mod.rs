//! Task orchestration
//!
//! State machine, per-task context and the orchestrator that drives them.

pub mod context;
pub mod orchestrator;
pub mod state;

pub use context::{TaskContext, TaskRequest};
pub use orchestrator::{OrchestratorSettings, TaskOrchestrator};
pub use state::{TaskEvent, TaskState};

//! Task pipeline state machine
//!
//! Forward-only: no transition re-enters an earlier stage. Memory lookup,
//! plugin dispatch and memory write are optional and may be skipped.
//! `Completed` and `Failed` are terminal and reject every event.

use crate::errors::{AlfredError, Result};
use serde::{Deserialize, Serialize};

/// Task pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Created,
    MemoryLookup,
    ModelSelection,
    ModelCall,
    PluginDispatch,
    MemoryWrite,
    /// Terminal: result returned
    Completed,
    /// Terminal: a step failed
    Failed,
}

/// Events that advance a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    LookupMemory,
    SelectModel,
    CallModel,
    DispatchPlugins,
    WriteMemory,
    Complete,
    Fail,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Valid transitions:
    ///
    /// ```text
    /// Created        → MemoryLookup | ModelSelection
    /// MemoryLookup   → ModelSelection
    /// ModelSelection → ModelCall
    /// ModelCall      → PluginDispatch | MemoryWrite | Completed
    /// PluginDispatch → MemoryWrite | Completed
    /// MemoryWrite    → Completed
    /// any non-terminal → Failed
    /// ```
    pub fn transition(&self, event: TaskEvent) -> Result<TaskState> {
        use TaskEvent::*;
        use TaskState::*;

        let next = match (self, event) {
            (Completed | Failed, _) => return Err(invalid(self, event)),
            (_, Fail) => Failed,

            (Created, LookupMemory) => MemoryLookup,
            (Created | MemoryLookup, SelectModel) => ModelSelection,
            (ModelSelection, CallModel) => ModelCall,
            (ModelCall, DispatchPlugins) => PluginDispatch,
            (ModelCall | PluginDispatch, WriteMemory) => MemoryWrite,
            (ModelCall | PluginDispatch | MemoryWrite, Complete) => Completed,

            (from, event) => return Err(invalid(from, event)),
        };

        Ok(next)
    }

    /// Events accepted from this state
    pub fn valid_events(&self) -> Vec<TaskEvent> {
        use TaskEvent::*;
        use TaskState::*;

        match self {
            Created => vec![LookupMemory, SelectModel, Fail],
            MemoryLookup => vec![SelectModel, Fail],
            ModelSelection => vec![CallModel, Fail],
            ModelCall => vec![DispatchPlugins, WriteMemory, Complete, Fail],
            PluginDispatch => vec![WriteMemory, Complete, Fail],
            MemoryWrite => vec![Complete, Fail],
            Completed | Failed => vec![],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaskState::Created => "Created",
            TaskState::MemoryLookup => "Retrieving Memory",
            TaskState::ModelSelection => "Selecting Model",
            TaskState::ModelCall => "Calling Model",
            TaskState::PluginDispatch => "Running Plugins",
            TaskState::MemoryWrite => "Storing Memory",
            TaskState::Completed => "Completed",
            TaskState::Failed => "Failed",
        }
    }
}

fn invalid(from: &TaskState, event: TaskEvent) -> AlfredError {
    AlfredError::InvalidTransition {
        from: from.display_name().to_string(),
        event: format!("{:?}", event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [TaskState; 8] = [
        TaskState::Created,
        TaskState::MemoryLookup,
        TaskState::ModelSelection,
        TaskState::ModelCall,
        TaskState::PluginDispatch,
        TaskState::MemoryWrite,
        TaskState::Completed,
        TaskState::Failed,
    ];

    const ALL_EVENTS: [TaskEvent; 7] = [
        TaskEvent::LookupMemory,
        TaskEvent::SelectModel,
        TaskEvent::CallModel,
        TaskEvent::DispatchPlugins,
        TaskEvent::WriteMemory,
        TaskEvent::Complete,
        TaskEvent::Fail,
    ];

    fn rank(state: TaskState) -> usize {
        ALL_STATES.iter().position(|s| *s == state).unwrap()
    }

    #[test]
    fn test_full_pipeline() {
        let mut state = TaskState::Created;
        for event in [
            TaskEvent::LookupMemory,
            TaskEvent::SelectModel,
            TaskEvent::CallModel,
            TaskEvent::DispatchPlugins,
            TaskEvent::WriteMemory,
            TaskEvent::Complete,
        ] {
            state = state.transition(event).unwrap();
        }
        assert_eq!(state, TaskState::Completed);
    }

    #[test]
    fn test_skip_optional_steps() {
        let state = TaskState::Created
            .transition(TaskEvent::SelectModel)
            .and_then(|s| s.transition(TaskEvent::CallModel))
            .and_then(|s| s.transition(TaskEvent::Complete))
            .unwrap();
        assert_eq!(state, TaskState::Completed);
    }

    #[test]
    fn test_model_call_cannot_be_skipped() {
        assert!(TaskState::ModelSelection.transition(TaskEvent::Complete).is_err());
        assert!(TaskState::Created.transition(TaskEvent::CallModel).is_err());
    }

    #[test]
    fn test_fail_from_any_active_state() {
        for state in ALL_STATES.iter().filter(|s| !s.is_terminal()) {
            assert_eq!(state.transition(TaskEvent::Fail).unwrap(), TaskState::Failed);
        }
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for state in [TaskState::Completed, TaskState::Failed] {
            assert!(state.valid_events().is_empty());
            for event in ALL_EVENTS {
                assert!(state.transition(event).is_err());
            }
        }
    }

    #[test]
    fn test_never_moves_backwards() {
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                if let Ok(next) = state.transition(event) {
                    assert!(rank(next) > rank(state), "{:?} -> {:?}", state, next);
                }
            }
        }
    }

    #[test]
    fn test_valid_events_match_transition() {
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                let listed = state.valid_events().contains(&event);
                assert_eq!(listed, state.transition(event).is_ok(), "{:?} on {:?}", state, event);
            }
        }
    }

    #[test]
    fn test_invalid_transition_names_stage() {
        let err = TaskState::ModelCall.transition(TaskEvent::LookupMemory).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid task transition from Calling Model on LookupMemory"
        );
        assert_eq!(TaskState::MemoryWrite.display_name(), "Storing Memory");
    }
}

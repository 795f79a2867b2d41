//! Lifecycle states of a process handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a [`ProcessHandle`](super::ProcessHandle) is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Never run, or freshly derived.
    #[default]
    Idle,
    /// An OS process is owned and has not yet finished.
    Running,
    /// The last run exited with code 0.
    Completed,
    /// The last run failed, was cancelled, or was killed.
    Failed,
}

impl ProcessState {
    /// Completed or Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Completed | ProcessState::Failed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Idle => "idle",
            ProcessState::Running => "running",
            ProcessState::Completed => "completed",
            ProcessState::Failed => "failed",
        };
        f.write_str(name)
    }
}

//! Centralized configuration for procflow.
//!
//! Constants for shell invocation and process handling, plus the JSON batch
//! file format consumed by the `procflow` binary.

use crate::error::{ProcflowError, Result};
use crate::process::{ProcessHandle, ProcessManager};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "procflow";
}

/// Shell used to interpret command strings.
pub struct ShellConfig;

impl ShellConfig {
    #[cfg(unix)]
    pub const PROGRAM: &'static str = "/bin/sh";
    #[cfg(unix)]
    pub const COMMAND_FLAG: &'static str = "-c";

    #[cfg(windows)]
    pub const PROGRAM: &'static str = "cmd";
    #[cfg(windows)]
    pub const COMMAND_FLAG: &'static str = "/C";
}

/// Process handling parameters.
pub struct ProcessConfig;

impl ProcessConfig {
    /// Signal sent on cancellation or `kill()`. There is no escalation.
    #[cfg(unix)]
    pub const TERMINATE_SIGNAL: nix::sys::signal::Signal = nix::sys::signal::Signal::SIGTERM;

    /// Upper bound accepted for a batch deadline.
    pub const MAX_BATCH_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
}

/// One entry of a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub id: u64,
    pub command: String,
}

/// A batch of commands to run together.
///
/// ```json
/// { "timeout_secs": 30, "processes": [ { "id": 1, "command": "sleep 1" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Optional deadline for the whole batch, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub processes: Vec<ProcessEntry>,
}

impl BatchConfig {
    /// Build a batch from bare command strings, numbering them from 1.
    pub fn from_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let processes = commands
            .into_iter()
            .zip(1u64..)
            .map(|(command, id)| ProcessEntry {
                id,
                command: command.into(),
            })
            .collect();

        Self {
            timeout_secs: None,
            processes,
        }
    }

    /// Parse a batch from a JSON string and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BatchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a batch from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading batch config from {}", path.display());
        let contents =
            std::fs::read_to_string(path).map_err(|e| ProcflowError::io_with_path(e, path))?;
        Self::from_json(&contents)
    }

    /// Reject batches that cannot run.
    pub fn validate(&self) -> Result<()> {
        if let Some(entry) = self.processes.iter().find(|p| p.command.trim().is_empty()) {
            return Err(ProcflowError::Config {
                message: format!("process {} has an empty command", entry.id),
            });
        }
        if self.timeout().is_some_and(|t| t > ProcessConfig::MAX_BATCH_TIMEOUT) {
            return Err(ProcflowError::Config {
                message: format!(
                    "timeout_secs exceeds the maximum of {}",
                    ProcessConfig::MAX_BATCH_TIMEOUT.as_secs()
                ),
            });
        }
        Ok(())
    }

    /// Batch deadline, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Build a manager holding one fresh handle per entry, in file order.
    pub fn to_manager(&self) -> ProcessManager {
        ProcessManager::with_handles(
            self.processes
                .iter()
                .map(|entry| ProcessHandle::new(entry.id, entry.command.clone())),
        )
    }
}

//! Error types for procflow.
//!
//! Every lifecycle failure is terminal and reported to the immediate caller.
//! Nothing here is retried internally; a caller wanting another attempt derives
//! a fresh handle and runs it again.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the procflow library.
#[derive(Debug, Error)]
pub enum ProcflowError {
    // Lifecycle errors
    #[error("Run aborted: cancellation token fired before start")]
    AbortedBeforeStart,

    #[error("Process is already running")]
    AlreadyRunning,

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process exited with non-zero code {0}")]
    NonZeroExit(i32),

    #[error("Process terminated by signal {0}")]
    TerminatedBySignal(i32),

    #[error("Process run was cancelled")]
    Cancelled,

    #[error("Process was killed")]
    Killed,

    #[error("Cannot derive a handle while it is running")]
    CannotDeriveWhileRunning,

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type alias for procflow operations.
pub type Result<T> = std::result::Result<T, ProcflowError>;

impl From<std::io::Error> for ProcflowError {
    fn from(err: std::io::Error) -> Self {
        ProcflowError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ProcflowError {
    fn from(err: serde_json::Error) -> Self {
        ProcflowError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<tokio::task::JoinError> for ProcflowError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProcflowError::Task(err.to_string())
    }
}

impl ProcflowError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ProcflowError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether this failure came from a cancellation token rather than the
    /// process itself.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ProcflowError::AbortedBeforeStart | ProcflowError::Cancelled
        )
    }

    /// Exit code a front end should report for this failure.
    ///
    /// A child's own non-zero code is passed through; signal deaths follow the
    /// shell convention of `128 + signal`; cancellation maps to 130 (SIGINT).
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcflowError::NonZeroExit(code) => *code,
            ProcflowError::TerminatedBySignal(signal) => 128 + signal,
            ProcflowError::AbortedBeforeStart | ProcflowError::Cancelled => 130,
            ProcflowError::SpawnError { .. } => 127,
            ProcflowError::Config { .. } | ProcflowError::Json { .. } => 2,
            _ => 1,
        }
    }
}

//! Procflow Core - lifecycle management for shell-spawned OS processes.
//!
//! This crate wraps single process invocations in a [`ProcessHandle`] state
//! machine (spawn, observe exit, cancel, clean up) and runs batches of them
//! concurrently through a [`ProcessManager`].
//!
//! # Example
//!
//! ```rust,no_run
//! use procflow_core::{CancellationToken, ProcessHandle};
//!
//! #[tokio::main]
//! async fn main() -> procflow_core::Result<()> {
//!     let handle = ProcessHandle::new(1, "echo hello && sleep 1");
//!     let token = CancellationToken::new();
//!
//!     handle.run(Some(&token)).await?;
//!     assert!(handle.is_completed());
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod platform;
pub mod process;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{BatchConfig, ProcessEntry};
pub use error::{ProcflowError, Result};
pub use process::{ProcessHandle, ProcessManager, ProcessState};

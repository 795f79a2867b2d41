//! Process lifecycle management.
//!
//! A [`ProcessHandle`] wraps one shell command and runs it at most once at a
//! time, with cancellation and guaranteed cleanup. A [`ProcessManager`] holds
//! an ordered set of handles and runs them all concurrently.
//!
//! # Example
//!
//! ```rust,no_run
//! use procflow_core::{CancellationToken, ProcessHandle, ProcessManager};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> procflow_core::Result<()> {
//!     let mut manager = ProcessManager::new();
//!     manager
//!         .add(ProcessHandle::new(1, "sleep 1"))
//!         .add(ProcessHandle::new(2, "echo done"));
//!
//!     let token = CancellationToken::new();
//!     let _deadline = token.cancel_after(Duration::from_secs(10));
//!
//!     manager.run_all(Some(&token)).await
//! }
//! ```

mod handle;
mod manager;
mod shell;
mod state;

pub use handle::ProcessHandle;
pub use manager::ProcessManager;
pub use shell::shell_command;
pub use state::ProcessState;

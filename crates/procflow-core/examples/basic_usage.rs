//! Basic usage example - run a few commands as one batch with a deadline

use procflow_core::{CancellationToken, ProcessHandle, ProcessManager, Result};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Get deadline from args or default to 5 seconds
    let deadline = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let mut manager = ProcessManager::new();
    manager
        .add(ProcessHandle::new(1, "sleep 1 && echo one"))
        .add(ProcessHandle::new(2, "sleep 2 && echo two"))
        .add(ProcessHandle::new(3, "echo three"));

    let token = CancellationToken::new();
    let _timer = token.cancel_after(Duration::from_secs(deadline));

    println!("Running {} processes (deadline {}s)...", manager.len(), deadline);
    for (id, result) in manager.run_all_settled(Some(&token)).await {
        match result {
            Ok(()) => println!("  - {} ok", id),
            Err(e) => println!("  - {} failed: {}", id, e),
        }
    }

    // A failed handle can be retried through a fresh copy.
    if let Some(handle) = manager.get(2).filter(|h| h.state() != procflow_core::ProcessState::Completed) {
        let retry = handle.derive()?;
        retry.run(None).await?;
    }

    Ok(())
}

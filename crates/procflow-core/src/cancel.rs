//! Shared cancellation token for process runs.
//!
//! A `CancellationToken` is created by the caller (tied to a deadline, Ctrl-C,
//! or a user action) and handed to [`ProcessHandle::run`] or
//! [`ProcessManager::run_all`]. Every clone observes the same state, so a
//! single token fanned out across a batch cancels every handle at once.
//!
//! [`ProcessHandle::run`]: crate::process::ProcessHandle::run
//! [`ProcessManager::run_all`]: crate::process::ProcessManager::run_all

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

/// A cancellation token for cooperative cancellation of process runs.
///
/// The token can be polled with [`is_cancelled`](Self::is_cancelled) or
/// awaited with [`cancelled`](Self::cancelled). Cancellation is one-way: once
/// fired, a token stays fired.
///
/// # Example
///
/// ```
/// use procflow_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let token_clone = token.clone();
///
/// // Cancel from another task
/// token_clone.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation, and every task
    /// parked in [`cancelled`](Self::cancelled) is woken.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            debug!("Cancellation requested");
            self.inner.notify.notify_waiters();
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is requested.
    ///
    /// Resolves immediately if the token has already fired.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the flag check so a concurrent `cancel()` between
            // the check and the await still wakes us.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Fire this token once `delay` has elapsed.
    ///
    /// Handles have no built-in timeout; this is the caller-side way to put a
    /// deadline on a run. Aborting the returned task disarms the timer.
    pub fn cancel_after(&self, delay: Duration) -> JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Deadline of {:?} elapsed, cancelling", delay);
            token.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_already_fired() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("already-fired token should resolve immediately");
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::task::yield_now().await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fires_on_deadline() {
        let token = CancellationToken::new();
        let _timer = token.cancel_after(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!token.is_cancelled());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(token.is_cancelled());
    }
}

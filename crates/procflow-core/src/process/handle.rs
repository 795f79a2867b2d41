//! Lifecycle state machine around a single shell command.

use super::shell::shell_command_with;
use super::state::ProcessState;
use crate::cancel::CancellationToken;
use crate::config::ShellConfig;
use crate::error::{ProcflowError, Result};
use crate::platform;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// A restartable unit of work: one shell command plus the state of its most
/// recent run.
///
/// A handle owns at most one OS process at a time. State transitions:
///
/// ```text
/// Idle ──run──▶ Running ──exit 0──────────────────▶ Completed
///                  │
///                  └──exit≠0 / spawn error / cancel / kill──▶ Failed
/// ```
///
/// Terminal states are durable: a completed handle stays completed, and a
/// further `run` is a no-op. A failed handle may be run again, though
/// [`derive`](Self::derive) is the usual way to retry.
#[derive(Debug)]
pub struct ProcessHandle {
    id: u64,
    command: String,
    shell: &'static str,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: ProcessState,
    process: Option<OwnedProcess>,
    runs: u64,
}

/// The live process of one run, as seen from outside the run future.
#[derive(Debug)]
struct OwnedProcess {
    run: u64,
    pid: Option<u32>,
    kill_switch: Arc<Notify>,
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    Killed,
}

impl ProcessHandle {
    /// Create an idle handle for `command`.
    pub fn new(id: u64, command: impl Into<String>) -> Self {
        Self::with_shell(id, command, ShellConfig::PROGRAM)
    }

    /// Create an idle handle whose command is interpreted by `shell`.
    pub(crate) fn with_shell(id: u64, command: impl Into<String>, shell: &'static str) -> Self {
        Self {
            id,
            command: command.into(),
            shell,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessState::Running
    }

    /// True once a run has reached a terminal state, Completed or Failed.
    ///
    /// This does not mean `run` is a no-op: only a Completed handle skips the
    /// next `run`, while a Failed one spawns its command again. Check
    /// [`state`](Self::state) to tell the two apart.
    pub fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// PID of the owned OS process, if one is live.
    pub fn pid(&self) -> Option<u32> {
        self.lock().process.as_ref().and_then(|p| p.pid)
    }

    /// Run the command to completion.
    ///
    /// Resolves `Ok` when the process exits with code 0. Fails with:
    /// - `AbortedBeforeStart` if `cancel` has already fired (nothing is spawned)
    /// - `AlreadyRunning` if another run of this handle is in flight
    /// - `SpawnError` if the shell cannot be started or waited on
    /// - `NonZeroExit` / `TerminatedBySignal` for an unsuccessful exit
    /// - `Cancelled` if `cancel` fires first; the process is sent one
    ///   termination request and not waited on
    /// - `Killed` if [`kill`](Self::kill) is called during the run
    ///
    /// A handle that already completed successfully returns `Ok` without
    /// spawning anything.
    ///
    /// Dropping the returned future mid-run releases the process and marks the
    /// handle Failed.
    pub async fn run(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            debug!("Process {}: token already fired, not starting", self.id);
            return Err(ProcflowError::AbortedBeforeStart);
        }

        let kill_switch = Arc::new(Notify::new());
        let run = {
            let mut inner = self.lock();
            match inner.state {
                ProcessState::Completed => {
                    debug!("Process {} already completed, skipping", self.id);
                    return Ok(());
                }
                ProcessState::Running => return Err(ProcflowError::AlreadyRunning),
                ProcessState::Idle | ProcessState::Failed => {}
            }
            inner.runs += 1;
            inner.state = ProcessState::Running;
            inner.process = Some(OwnedProcess {
                run: inner.runs,
                pid: None,
                kill_switch: kill_switch.clone(),
            });
            inner.runs
        };
        let _cleanup = CleanupGuard { handle: self, run };

        let mut child = match shell_command_with(self.shell, &self.command).spawn() {
            Ok(child) => child,
            Err(source) => {
                error!("Process {}: failed to spawn `{}`: {}", self.id, self.command, source);
                self.finish(run, ProcessState::Failed);
                return Err(ProcflowError::SpawnError {
                    command: self.command.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        if let Some(process) = self.lock().process.as_mut().filter(|p| p.run == run) {
            process.pid = pid;
        }
        info!("Process {} started (pid {:?}): {}", self.id, pid, self.command);

        let outcome = tokio::select! {
            biased;
            status = child.wait() => Outcome::Exited(status),
            _ = wait_for_cancel(cancel) => Outcome::Cancelled,
            _ = kill_switch.notified() => Outcome::Killed,
        };

        match outcome {
            Outcome::Exited(Ok(status)) => {
                let result = exit_result(status);
                let state = if result.is_ok() {
                    ProcessState::Completed
                } else {
                    ProcessState::Failed
                };
                // `kill` may release the process after it exited but before
                // this run observed the exit; the kill wins.
                if !self.finish(run, state) {
                    info!("Process {} killed after exiting ({})", self.id, status);
                    return Err(ProcflowError::Killed);
                }
                match &result {
                    Ok(()) => info!("Process {} completed", self.id),
                    Err(e) => warn!("Process {} failed: {}", self.id, e),
                }
                result
            }
            Outcome::Exited(Err(source)) => {
                error!("Process {}: error waiting on child: {}", self.id, source);
                if !self.finish(run, ProcessState::Failed) {
                    return Err(ProcflowError::Killed);
                }
                Err(ProcflowError::SpawnError {
                    command: self.command.clone(),
                    source,
                })
            }
            Outcome::Cancelled => {
                info!("Process {} cancelled, terminating pid {:?}", self.id, pid);
                platform::request_termination(&mut child);
                reap_in_background(child);
                self.finish(run, ProcessState::Failed);
                Err(ProcflowError::Cancelled)
            }
            Outcome::Killed => {
                info!("Process {} killed, terminating pid {:?}", self.id, pid);
                platform::request_termination(&mut child);
                reap_in_background(child);
                Err(ProcflowError::Killed)
            }
        }
    }

    /// Create a fresh idle handle with the same id and command.
    ///
    /// Nothing from previous runs is carried over; this is a constructor, not a
    /// cache. Fails while this handle is running.
    pub fn derive(&self) -> Result<ProcessHandle> {
        if self.is_running() {
            return Err(ProcflowError::CannotDeriveWhileRunning);
        }
        Ok(ProcessHandle::with_shell(self.id, self.command.clone(), self.shell))
    }

    /// Terminate the owned process, if any, and release it.
    ///
    /// The in-flight `run` sends the termination request and fails with
    /// `Killed`. Calling this on an idle or finished handle does nothing, so
    /// repeated calls are safe.
    pub fn kill(&self) {
        let mut inner = self.lock();
        match inner.process.take() {
            Some(process) => {
                debug!("Process {}: kill requested (pid {:?})", self.id, process.pid);
                process.kill_switch.notify_one();
                inner.state = ProcessState::Failed;
            }
            None => debug!("Process {}: kill with no live process", self.id),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the terminal state of `run` and release its process.
    ///
    /// No-op returning false if the run was already released (by `kill` or
    /// an earlier terminal event), so a later run's state is never
    /// overwritten.
    fn finish(&self, run: u64, state: ProcessState) -> bool {
        let mut inner = self.lock();
        if inner.process.as_ref().is_some_and(|p| p.run == run) {
            inner.process = None;
            inner.state = state;
            true
        } else {
            false
        }
    }
}

/// Releases the process of a run on every exit path, including when the run
/// future is dropped before reaching a terminal event.
struct CleanupGuard<'a> {
    handle: &'a ProcessHandle,
    run: u64,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.handle.lock();
        if inner.process.as_ref().is_some_and(|p| p.run == self.run) {
            debug!("Process {}: run abandoned, releasing", self.handle.id);
            inner.process = None;
            inner.state = ProcessState::Failed;
        }
    }
}

async fn wait_for_cancel(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn exit_result(status: ExitStatus) -> Result<()> {
    if let Some(code) = status.code() {
        return if code == 0 {
            Ok(())
        } else {
            Err(ProcflowError::NonZeroExit(code))
        };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(ProcflowError::TerminatedBySignal(signal));
        }
    }

    Err(ProcflowError::NonZeroExit(-1))
}

/// Collect the exit status of a terminated child so it does not linger as a
/// zombie. The caller does not wait for this.
fn reap_in_background(mut child: tokio::process::Child) {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("Reaped terminated child: {}", status),
            Err(e) => debug!("Failed to reap terminated child: {}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_idle() {
        let handle = ProcessHandle::new(3, "echo hi");
        assert_eq!(handle.id(), 3);
        assert_eq!(handle.command(), "echo hi");
        assert_eq!(handle.state(), ProcessState::Idle);
        assert!(!handle.is_running());
        assert!(!handle.is_completed());
        assert_eq!(handle.pid(), None);
    }

    #[test]
    fn test_kill_idle_handle_is_noop() {
        let handle = ProcessHandle::new(1, "true");
        handle.kill();
        handle.kill();
        assert_eq!(handle.state(), ProcessState::Idle);
    }

    #[tokio::test]
    async fn test_aborted_before_start() {
        let handle = ProcessHandle::new(1, "true");
        let token = CancellationToken::new();
        token.cancel();

        let err = handle.run(Some(&token)).await.unwrap_err();
        assert!(matches!(err, ProcflowError::AbortedBeforeStart));
        assert_eq!(handle.state(), ProcessState::Idle);
    }

    #[test]
    fn test_derive_idle_handle() {
        let handle = ProcessHandle::new(9, "sleep 1");
        let derived = handle.derive().unwrap();
        assert_eq!(derived.id(), 9);
        assert_eq!(derived.command(), "sleep 1");
        assert_eq!(derived.state(), ProcessState::Idle);
    }

    #[test]
    fn test_finish_ignores_stale_run() {
        let handle = ProcessHandle::new(1, "true");
        {
            let mut inner = handle.lock();
            inner.runs = 2;
            inner.state = ProcessState::Running;
            inner.process = Some(OwnedProcess {
                run: 2,
                pid: None,
                kill_switch: Arc::new(Notify::new()),
            });
        }

        assert!(!handle.finish(1, ProcessState::Completed));
        assert!(handle.is_running());

        assert!(handle.finish(2, ProcessState::Completed));
        assert_eq!(handle.state(), ProcessState::Completed);
        assert!(!handle.finish(2, ProcessState::Failed));
        assert_eq!(handle.state(), ProcessState::Completed);
    }

    #[tokio::test]
    async fn test_missing_shell_reports_spawn_error() {
        let handle = ProcessHandle::with_shell(4, "true", "/nonexistent/procflow-shell");

        let err = handle.run(None).await.unwrap_err();
        assert!(matches!(err, ProcflowError::SpawnError { .. }));
        assert_eq!(handle.state(), ProcessState::Failed);
        assert_eq!(handle.pid(), None);
        assert!(handle.is_completed());

        // A derived handle keeps the same shell.
        let derived = handle.derive().unwrap();
        let err = derived.run(None).await.unwrap_err();
        assert!(matches!(err, ProcflowError::SpawnError { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_after_unobserved_exit_reports_killed() {
        let handle = Arc::new(ProcessHandle::new(5, "sleep 0.05"));
        let run = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.run(None).await })
        };

        while handle.pid().is_none() {
            tokio::task::yield_now().await;
        }
        // Block the only runtime thread until the child has exited, so the
        // run cannot observe the exit before `kill` releases the process.
        std::thread::sleep(std::time::Duration::from_millis(300));
        handle.kill();

        let result = run.await.unwrap();
        assert!(matches!(result, Err(ProcflowError::Killed)));
        assert_eq!(handle.state(), ProcessState::Failed);
        assert_eq!(handle.pid(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_result_mapping() {
        use std::os::unix::process::ExitStatusExt;

        assert!(exit_result(ExitStatus::from_raw(0)).is_ok());
        assert!(matches!(
            exit_result(ExitStatus::from_raw(3 << 8)),
            Err(ProcflowError::NonZeroExit(3))
        ));
        assert!(matches!(
            exit_result(ExitStatus::from_raw(15)),
            Err(ProcflowError::TerminatedBySignal(15))
        ));
    }
}

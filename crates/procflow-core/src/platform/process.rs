//! Platform-specific process signalling.
//!
//! Termination here is best-effort: one request, no confirmation that the
//! process actually died and no follow-up SIGKILL.

use tokio::process::Child;
use tracing::{debug, warn};

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: `kill(pid, 0)`; an unreaped zombie still counts as alive
/// - **Other**: not implemented, assumes alive
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match i32::try_from(pid) {
            Ok(raw) => kill(Pid::from_raw(raw), None).is_ok(),
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        warn!("Process alive check not implemented for this platform");
        true
    }
}

/// Ask a child process to terminate.
///
/// Returns `true` if a request was delivered, `false` if the child had already
/// exited (or been reaped) so there was nothing to signal.
///
/// # Platform Behavior
/// - **Linux/macOS**: sends `SIGTERM` to the child's PID
/// - **Windows**: `TerminateProcess` through tokio's `start_kill`
pub fn request_termination(child: &mut Child) -> bool {
    let Some(pid) = child.id() else {
        debug!("Child already reaped, nothing to terminate");
        return false;
    };

    #[cfg(unix)]
    {
        use crate::config::ProcessConfig;
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return start_kill(child, pid);
        };

        debug!("Sending {} to process {}", ProcessConfig::TERMINATE_SIGNAL, pid);
        match kill(Pid::from_raw(raw), ProcessConfig::TERMINATE_SIGNAL) {
            Ok(()) => true,
            Err(Errno::ESRCH) => false,
            Err(e) => {
                warn!("Failed to signal process {}: {}, falling back to kill", pid, e);
                start_kill(child, pid)
            }
        }
    }

    #[cfg(not(unix))]
    {
        start_kill(child, pid)
    }
}

fn start_kill(child: &mut Child, pid: u32) -> bool {
    match child.start_kill() {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to kill process {}: {}", pid, e);
            false
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::process::Command;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn test_out_of_range_pid_is_not_alive() {
        assert!(!is_process_alive(u32::MAX));
    }

    #[tokio::test]
    async fn test_request_termination_stops_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        assert!(request_termination(&mut child));

        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child should exit after SIGTERM")
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_request_termination_after_exit() {
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().await.unwrap();

        assert!(!request_termination(&mut child));
    }
}

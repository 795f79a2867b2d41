//! Shell invocation for command strings.

use crate::config::ShellConfig;
use std::process::Stdio;
use tokio::process::Command;

/// Build a command that runs `command` through the platform shell.
///
/// Output is inherited from the parent rather than captured. The child is
/// killed if its `Child` is dropped before exiting, so abandoning a run never
/// leaks a process.
pub fn shell_command(command: &str) -> Command {
    shell_command_with(ShellConfig::PROGRAM, command)
}

/// Like [`shell_command`], with `program` standing in for the platform shell.
pub(crate) fn shell_command_with(program: &str, command: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg(ShellConfig::COMMAND_FLAG).arg(command);
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    cmd
}

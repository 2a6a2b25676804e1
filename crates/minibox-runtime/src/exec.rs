//! Running an additional command inside a running container.
//!
//! `setns(2)` into a mount namespace only works for a single-threaded
//! process, so the caller re-executes this binary with the target pid and
//! command in [`EXEC_PID_ENV`] and [`EXEC_CMD_ENV`]. The fresh process joins
//! the container's namespaces before anything else runs, then spawns the
//! command through `/bin/sh`.

use std::process::{Command, ExitStatus};

use minibox_common::constants::{EXEC_CMD_ENV, EXEC_PID_ENV, SELF_EXE};
use minibox_common::error::{MiniboxError, Result};
use minibox_core::namespace::join::join_all;

/// Shell used to run the joined command.
const SHELL: &str = "/bin/sh";

/// A request to join the namespaces of `pid` and run `command` there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Host pid whose namespaces are joined.
    pub pid: i32,
    /// Shell command line run after joining.
    pub command: String,
}

impl ExecRequest {
    /// Reads the request from the process environment.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_vars(std::env::var(EXEC_PID_ENV).ok(), std::env::var(EXEC_CMD_ENV).ok())
    }

    /// Builds a request from raw variable values.
    ///
    /// Both must be present and non-empty, and the pid must be a positive
    /// integer; otherwise there is no request.
    #[must_use]
    pub fn from_vars(pid: Option<String>, command: Option<String>) -> Option<Self> {
        let (pid, command) = (pid?, command?);
        if pid.is_empty() || command.trim().is_empty() {
            return None;
        }
        match pid.parse::<i32>() {
            Ok(pid) if pid > 0 => Some(Self { pid, command }),
            _ => {
                tracing::warn!(%pid, "ignoring malformed {EXEC_PID_ENV}");
                None
            }
        }
    }
}

/// Joins the namespaces of `request.pid` and runs its command, returning
/// the command's exit code.
///
/// Must run before the process starts any thread. Namespaces that cannot be
/// joined are logged and skipped.
///
/// # Errors
///
/// Returns an error if the shell cannot be spawned.
pub fn enter_and_run(request: &ExecRequest) -> Result<i32> {
    let joined = join_all(request.pid);
    tracing::debug!(pid = request.pid, joined = joined.len(), "namespaces joined");

    let status = Command::new(SHELL)
        .arg("-c")
        .arg(&request.command)
        .status()
        .map_err(|e| MiniboxError::io(SHELL, e))?;
    Ok(status_code(status))
}

/// Splits the contents of a `/proc/<pid>/environ` file into its entries.
#[must_use]
pub fn parse_environ(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| String::from_utf8_lossy(entry).into_owned())
        .collect()
}

/// Environment of process `pid`.
///
/// # Errors
///
/// Returns an error if `/proc/<pid>/environ` cannot be read.
pub fn process_env(pid: i32) -> Result<Vec<String>> {
    let path = format!("/proc/{pid}/environ");
    let bytes = std::fs::read(&path).map_err(|e| MiniboxError::io(&path, e))?;
    Ok(parse_environ(&bytes))
}

/// Runs `command` inside the container whose init is `pid`, with the
/// container's environment, and returns its exit code.
///
/// # Errors
///
/// Returns an error if the command is empty, the container environment
/// cannot be read, or the helper process cannot be spawned.
pub fn exec_container(pid: i32, command: &[String]) -> Result<i32> {
    if command.is_empty() {
        return Err(MiniboxError::Config {
            message: "exec command is empty".into(),
        });
    }
    let line = command.join(" ");
    let env = process_env(pid)?;
    tracing::info!(pid, command = %line, "exec into container");

    let status = Command::new(SELF_EXE)
        .arg("exec")
        .envs(env.iter().filter_map(|entry| entry.split_once('=')))
        .env(EXEC_PID_ENV, pid.to_string())
        .env(EXEC_CMD_ENV, &line)
        .status()
        .map_err(|e| MiniboxError::io(SELF_EXE, e))?;
    Ok(status_code(status))
}

/// Shell-style exit code of a finished child.
fn status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

//! Launching a container's init process.
//!
//! The launcher materialises the container root, then `clone(2)`s a child
//! into five fresh namespaces. The child re-executes this binary with the
//! hidden `init` argument from inside the merged root, with the read end of
//! a command pipe on fd 3. Nothing runs in the container until the parent
//! writes the command to the pipe and closes it.

use std::ffi::CString;
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use minibox_common::constants::{INIT_PIPE_FD, SELF_EXE};
use minibox_common::error::{MiniboxError, Result};
use minibox_core::filesystem::overlayfs::UnionFs;
use minibox_core::filesystem::workspace::Workspace;
use minibox_core::namespace::container_clone_flags;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sched::clone;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, chdir, execve, pipe2};

use crate::container::ContainerConfig;

/// Stack handed to the cloned child.
const STACK_SIZE: usize = 1024 * 1024;

/// Hidden subcommand run inside the new namespaces.
pub const INIT_COMMAND: &str = "init";

/// A launched container whose init is waiting for its command.
#[derive(Debug)]
pub struct InitProcess {
    /// Host pid of the container's init.
    pub pid: Pid,
    /// Merged root the init runs in.
    pub root: PathBuf,
    pipe: Option<File>,
}

impl InitProcess {
    /// Wraps an already running init that reads its command from `pipe`.
    #[must_use]
    pub const fn new(pid: Pid, root: PathBuf, pipe: File) -> Self {
        Self {
            pid,
            root,
            pipe: Some(pipe),
        }
    }

    /// Writes the whitespace-joined command to the pipe and closes it,
    /// releasing the init process.
    ///
    /// # Errors
    ///
    /// Returns an error if the command was already sent or the write fails.
    pub fn send_command(&mut self, command: &[String]) -> Result<()> {
        let line = command.join(" ");
        let path = format!("/proc/{}/fd/{INIT_PIPE_FD}", self.pid);
        let mut pipe = self.pipe.take().ok_or_else(|| MiniboxError::Config {
            message: "container command already sent".into(),
        })?;
        pipe.write_all(line.as_bytes())
            .map_err(|e| MiniboxError::io(&path, e))?;
        tracing::info!(pid = %self.pid, command = %line, "command sent to container init");
        Ok(())
    }

    /// Blocks until the init process exits and returns its exit code.
    ///
    /// A process killed by a signal reports `128 + signal`.
    ///
    /// # Errors
    ///
    /// Returns an error if `waitpid(2)` fails.
    pub fn wait(&self) -> Result<i32> {
        wait_for(self.pid)
    }

    /// Kills the init process and reaps it.
    pub fn kill(&mut self) {
        drop(self.pipe.take());
        if let Err(e) = kill(self.pid, Signal::SIGKILL) {
            tracing::warn!(pid = %self.pid, error = %e, "failed to kill container init");
            return;
        }
        if let Err(e) = waitpid(self.pid, None) {
            tracing::warn!(pid = %self.pid, error = %e, "failed to reap container init");
        }
    }
}

/// Blocks until process `pid` exits and returns its exit code.
///
/// # Errors
///
/// Returns an error if `waitpid(2)` fails.
pub fn wait_for(pid: Pid) -> Result<i32> {
    let status = waitpid(pid, None)
        .map_err(|e| MiniboxError::syscall("waitpid", format!("/proc/{pid}"), e))?;
    Ok(exit_code(status))
}

/// Shell-style exit code of a wait status.
#[must_use]
pub fn exit_code(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => 0,
    }
}

fn c_string(s: &str) -> Result<CString> {
    CString::new(s).map_err(|e| MiniboxError::Config {
        message: e.to_string(),
    })
}

/// Builds the child's `KEY=VALUE` environment: the caller's environment
/// followed by `extra`.
///
/// # Errors
///
/// Returns an error if an entry contains a NUL byte.
pub fn child_env(extra: &[String]) -> Result<Vec<CString>> {
    std::env::vars_os()
        .map(|(key, value)| {
            let mut entry = key.as_bytes().to_vec();
            entry.push(b'=');
            entry.extend_from_slice(value.as_bytes());
            entry
        })
        .chain(extra.iter().map(|e| e.as_bytes().to_vec()))
        .map(|entry| {
            CString::new(entry).map_err(|e| MiniboxError::Config {
                message: format!("environment entry contains NUL: {e}"),
            })
        })
        .collect()
}

/// Everything the child needs, prepared before `clone(2)`.
struct ChildSetup {
    exe: CString,
    argv: [CString; 2],
    envp: Vec<CString>,
    root: PathBuf,
    command_fd: OwnedFd,
    log: Option<File>,
}

impl ChildSetup {
    /// Runs in the cloned child. Only returns on failure.
    fn enter(&self) -> isize {
        match self.exec() {
            Ok(never) => match never {},
            Err(errno) => {
                tracing::error!(error = %errno, root = %self.root.display(), "container init setup failed");
                1
            }
        }
    }

    fn exec(&self) -> nix::Result<std::convert::Infallible> {
        if let Some(log) = &self.log {
            let fd = log.as_raw_fd();
            // SAFETY: both descriptors are open; dup2 has no memory effects.
            Errno::result(unsafe { libc::dup2(fd, libc::STDOUT_FILENO) })?;
            Errno::result(unsafe { libc::dup2(fd, libc::STDERR_FILENO) })?;
        }
        // SAFETY: as above. The pipe was created close-on-exec; the copy on
        // INIT_PIPE_FD must survive execve.
        Errno::result(unsafe { libc::dup2(self.command_fd.as_raw_fd(), INIT_PIPE_FD) })?;
        Errno::result(unsafe { libc::fcntl(INIT_PIPE_FD, libc::F_SETFD, 0) })?;

        chdir(&self.root)?;
        execve(&self.exe, &self.argv, &self.envp)
    }
}

/// Materialises the root of `config` and starts its init process.
///
/// The returned init is blocked reading its command; call
/// [`InitProcess::send_command`] once the cgroup and network are set up.
///
/// # Errors
///
/// Returns an error if the root filesystem, pipe, log file, or child cannot
/// be created. On failure nothing is left running, and neither the root nor
/// the container's log directory is left on disk.
pub fn launch<F: UnionFs>(
    workspace: &Workspace<F>,
    config: &ContainerConfig,
    log_path: &Path,
) -> Result<InitProcess> {
    let root = workspace.create(&config.name, &config.image, config.volume.as_ref())?;
    spawn_init(root, config, log_path).inspect_err(|e| {
        tracing::error!(name = %config.name, error = %e, "container launch failed, removing root");
        workspace.delete(&config.name, config.volume.as_ref());
        crate::logs::remove_log_dir(log_path);
    })
}

fn spawn_init(root: PathBuf, config: &ContainerConfig, log_path: &Path) -> Result<InitProcess> {
    let (command_fd, write_end) = pipe2(OFlag::O_CLOEXEC)
        .map_err(|e| MiniboxError::syscall("pipe2", "/proc/self/fd", e))?;
    let log = if config.tty {
        None
    } else {
        Some(crate::logs::create_log_file(log_path)?)
    };

    let setup = ChildSetup {
        exe: c_string(SELF_EXE)?,
        argv: [c_string(SELF_EXE)?, c_string(INIT_COMMAND)?],
        envp: child_env(&config.env)?,
        root,
        command_fd,
        log,
    };

    let mut stack = vec![0_u8; STACK_SIZE];
    // SAFETY: the child gets a copy of the address space (no CLONE_VM) and
    // only performs dup2, fcntl, chdir and execve before replacing itself.
    let pid = unsafe {
        clone(
            Box::new(|| setup.enter()),
            &mut stack,
            container_clone_flags(),
            Some(Signal::SIGCHLD as i32),
        )
    }
    .map_err(|e| MiniboxError::syscall("clone", SELF_EXE, e))?;

    tracing::info!(
        %pid,
        name = %config.name,
        tty = config.tty,
        root = %setup.root.display(),
        "container init started"
    );
    Ok(InitProcess {
        pid,
        root: setup.root,
        pipe: Some(File::from(write_end)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_env_follows_inherited_env() {
        let env = child_env(&["MINIBOX_TEST_EXTRA=1".into()]).unwrap();
        assert_eq!(env.last().unwrap().to_str().unwrap(), "MINIBOX_TEST_EXTRA=1");
        assert!(env.iter().all(|e| e.as_bytes().contains(&b'=')));
    }

    #[test]
    fn nul_in_env_is_rejected() {
        assert!(child_env(&["BAD=a\0b".into()]).is_err());
    }

    #[test]
    fn exit_code_reports_signals_shell_style() {
        let pid = Pid::from_raw(1);
        assert_eq!(exit_code(WaitStatus::Exited(pid, 3)), 3);
        assert_eq!(exit_code(WaitStatus::Signaled(pid, Signal::SIGKILL, false)), 137);
    }

    #[test]
    fn wait_for_reaps_child_exit_code() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        let pid = Pid::from_raw(i32::try_from(child.id()).unwrap());
        assert_eq!(wait_for(pid).unwrap(), 7);
    }
}

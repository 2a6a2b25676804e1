//! The hidden `init` entrypoint, run as the first code inside a new
//! container.
//!
//! The launcher starts this process with its working directory set to the
//! merged root and the command pipe on fd 3. Setup is strictly ordered:
//! private propagation, `pivot_root`, pseudo-filesystems, then the command
//! is read and the process image replaced. Any failure is fatal.

use std::convert::Infallible;
use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::FromRawFd;
use std::os::unix::ffi::OsStrExt;

use minibox_common::constants::INIT_PIPE_FD;
use minibox_common::error::{MiniboxError, Result};
use minibox_core::filesystem::mount::{make_rprivate, mount_dev, mount_proc};
use minibox_core::filesystem::pivot_root::pivot_root;
use nix::unistd::execv;

/// Splits a command line received over the pipe into its arguments.
///
/// # Errors
///
/// Returns [`MiniboxError::Config`] if the line holds no arguments.
pub fn parse_command(line: &str) -> Result<Vec<String>> {
    let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if args.is_empty() {
        return Err(MiniboxError::Config {
            message: "container command is empty".into(),
        });
    }
    Ok(args)
}

/// Reads `reader` to end-of-file and parses the command it carries.
///
/// # Errors
///
/// Returns an error if the read fails, the bytes are not UTF-8, or no
/// command was sent.
pub fn read_command<R: Read>(mut reader: R) -> Result<Vec<String>> {
    let mut line = String::new();
    let pipe = format!("/proc/self/fd/{INIT_PIPE_FD}");
    reader
        .read_to_string(&mut line)
        .map_err(|e| MiniboxError::io(&pipe, e))?;
    parse_command(&line)
}

/// Runs the init sequence and replaces the process with the container
/// command. Returns only on failure.
///
/// # Errors
///
/// Returns an error if any mount step fails, no command arrives, or the
/// command cannot be resolved or executed.
pub fn run_init() -> Result<Infallible> {
    let root = std::env::current_dir().map_err(|e| MiniboxError::io(".", e))?;
    tracing::info!(root = %root.display(), "container init starting");

    make_rprivate()?;
    pivot_root(&root)?;
    mount_proc()?;
    mount_dev()?;

    // SAFETY: the launcher places the read end of the command pipe on
    // INIT_PIPE_FD and nothing else in this process owns it.
    let pipe = unsafe { File::from_raw_fd(INIT_PIPE_FD) };
    let args = read_command(pipe)?;

    let program = which::which(&args[0]).map_err(|e| {
        tracing::error!(command = %args[0], error = %e, "command not found in container");
        MiniboxError::NotFound {
            kind: "executable",
            id: args[0].clone(),
        }
    })?;
    tracing::info!(program = %program.display(), args = ?args, "exec container command");

    let path = CString::new(program.as_os_str().as_bytes()).map_err(|e| MiniboxError::Config {
        message: e.to_string(),
    })?;
    let argv = args
        .iter()
        .map(|a| {
            CString::new(a.as_str()).map_err(|e| MiniboxError::Config {
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    execv(&path, &argv).map_err(|e| MiniboxError::syscall("execve", &program, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_splits_on_any_whitespace() {
        let args = parse_command("  sh -c\ttop\n").unwrap();
        assert_eq!(args, vec!["sh", "-c", "top"]);
    }

    #[test]
    fn blank_command_is_rejected() {
        assert!(parse_command("").is_err());
        assert!(parse_command(" \n\t").is_err());
    }

    #[test]
    fn read_command_consumes_until_eof() {
        let args = read_command(&b"sleep 30"[..]).unwrap();
        assert_eq!(args, vec!["sleep", "30"]);
    }

    #[test]
    fn read_command_rejects_invalid_utf8() {
        let err = read_command(&[0xff, 0xfe][..]).unwrap_err();
        assert!(matches!(err, MiniboxError::Io { .. }));
    }
}

//! Thread-scoped network namespace switching.
//!
//! `setns(2)` with `CLONE_NEWNET` changes the namespace of the calling
//! thread only. [`NetnsGuard`] moves the current thread into a container's
//! network namespace and moves it back when dropped, on every exit path.
//! [`run_in_netns`] runs a closure under such a guard on a dedicated thread,
//! so no other work ever executes on a thread that is inside a container.

use std::fs::File;
use std::path::Path;

use minibox_common::error::{MiniboxError, Result};
use minibox_core::namespace::NamespaceKind;
use minibox_core::namespace::join::open_namespace;
use nix::sched::{CloneFlags, setns};

/// Network namespace of the calling thread.
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Restores the thread's original network namespace on drop.
#[derive(Debug)]
pub struct NetnsGuard {
    original: File,
    pid: i32,
}

impl NetnsGuard {
    /// Moves the calling thread into the network namespace of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if either namespace file cannot be opened or
    /// `setns(2)` fails; the thread is then still in its original namespace.
    pub fn enter(pid: i32) -> Result<Self> {
        let original = File::open(THREAD_NETNS).map_err(|e| MiniboxError::io(THREAD_NETNS, e))?;
        let target = open_namespace(pid, NamespaceKind::Net)?;
        setns(&target, CloneFlags::CLONE_NEWNET)
            .map_err(|e| MiniboxError::syscall("setns", NamespaceKind::Net.proc_path(pid), e))?;
        tracing::debug!(pid, "entered container network namespace");
        Ok(Self { original, pid })
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        match setns(&self.original, CloneFlags::CLONE_NEWNET) {
            Ok(()) => tracing::debug!(pid = self.pid, "restored host network namespace"),
            Err(e) => tracing::error!(
                pid = self.pid,
                error = %MiniboxError::syscall("setns", Path::new(THREAD_NETNS), e),
                "failed to restore network namespace"
            ),
        }
    }
}

/// Runs `f` inside the network namespace of `pid` on a dedicated thread.
///
/// # Errors
///
/// Returns an error if the namespace cannot be entered, if `f` fails, or if
/// the worker thread panics.
pub fn run_in_netns<T, F>(pid: i32, f: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let _guard = NetnsGuard::enter(pid)?;
                f()
            })
            .join()
            .map_err(|_| {
                MiniboxError::io(
                    NamespaceKind::Net.proc_path(pid),
                    std::io::Error::other("network namespace worker panicked"),
                )
            })?
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entering_missing_process_fails_without_running_closure() {
        let ran = std::sync::atomic::AtomicBool::new(false);
        let result = run_in_netns(i32::MAX, || {
            ran.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_err());
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}

//! Joining the namespaces of an existing process via `setns(2)`.

use std::fs::File;

use minibox_common::error::{MiniboxError, Result};
use nix::sched::setns;

use super::NamespaceKind;

/// Opens `/proc/<pid>/ns/<kind>` for reading.
///
/// # Errors
///
/// Returns an error if the namespace file cannot be opened, typically
/// because the process no longer exists.
pub fn open_namespace(pid: i32, kind: NamespaceKind) -> Result<File> {
    let path = kind.proc_path(pid);
    File::open(&path).map_err(|e| MiniboxError::io(path, e))
}

/// Associates the calling thread with one namespace of process `pid`.
///
/// # Errors
///
/// Returns an error if the namespace file cannot be opened or `setns(2)`
/// fails.
pub fn join_namespace(pid: i32, kind: NamespaceKind) -> Result<()> {
    let file = open_namespace(pid, kind)?;
    setns(&file, kind.clone_flag())
        .map_err(|e| MiniboxError::syscall("setns", kind.proc_path(pid), e))?;
    tracing::debug!(pid, namespace = %kind, "joined namespace");
    Ok(())
}

/// Joins every container namespace of `pid` in [`NamespaceKind::JOIN_ORDER`].
///
/// A failing join is logged and skipped so the remaining kinds are still
/// attempted. Returns the kinds that were joined successfully.
pub fn join_all(pid: i32) -> Vec<NamespaceKind> {
    NamespaceKind::JOIN_ORDER
        .into_iter()
        .filter(|&kind| match join_namespace(pid, kind) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(pid, namespace = %kind, error = %e, "setns failed, skipping");
                false
            }
        })
        .collect()
}

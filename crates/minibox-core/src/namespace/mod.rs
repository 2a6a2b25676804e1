//! Linux namespace management for container isolation.
//!
//! New containers get their namespaces from a single `clone(2)` call using
//! [`container_clone_flags`]; running containers are entered with
//! `setns(2)` through the [`join`] module.

pub mod join;

use std::fmt;
use std::path::PathBuf;

use nix::sched::CloneFlags;

/// The namespace kinds a container is isolated in.
///
/// User namespaces are not created: the runtime expects to run as root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// System V IPC and POSIX message queues.
    Ipc,
    /// Hostname and domain name.
    Uts,
    /// Network devices, addresses, routes, and firewall tables.
    Net,
    /// Process ID space.
    Pid,
    /// Mount table.
    Mnt,
}

impl NamespaceKind {
    /// Join order used when entering a running container.
    ///
    /// The mount namespace comes last so `/proc/<pid>/ns/*` stays reachable
    /// for the earlier joins.
    pub const JOIN_ORDER: [Self; 5] = [Self::Ipc, Self::Uts, Self::Net, Self::Pid, Self::Mnt];

    /// Name of the entry under `/proc/<pid>/ns/`.
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Uts => "uts",
            Self::Net => "net",
            Self::Pid => "pid",
            Self::Mnt => "mnt",
        }
    }

    /// The `CLONE_NEW*` flag creating this namespace kind.
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::Net => CloneFlags::CLONE_NEWNET,
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Mnt => CloneFlags::CLONE_NEWNS,
        }
    }

    /// Path of this namespace for the process `pid`.
    #[must_use]
    pub fn proc_path(self, pid: i32) -> PathBuf {
        PathBuf::from(format!("/proc/{pid}/ns/{}", self.proc_name()))
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

/// Flags creating all five container namespaces in one `clone(2)` call.
#[must_use]
pub fn container_clone_flags() -> CloneFlags {
    NamespaceKind::JOIN_ORDER
        .iter()
        .fold(CloneFlags::empty(), |flags, kind| flags | kind.clone_flag())
}

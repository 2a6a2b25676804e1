//! Unified error type for the minibox workspace.
//!
//! Every library crate returns [`MiniboxError`]; the CLI converts it into an
//! `anyhow::Error` at the top level.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MiniboxError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A system call failed.
    #[error("{op} failed on {path}: {source}")]
    Syscall {
        /// Name of the failing operation (`mount`, `pivot_root`, `setns`, ...).
        op: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// An external helper program exited unsuccessfully.
    #[error("`{program} {args}` failed: {stderr}")]
    Command {
        /// Program that was invoked.
        program: &'static str,
        /// Space-joined argument list.
        args: String,
        /// Captured standard error (or the spawn error).
        stderr: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Every host address in a subnet is already allocated.
    #[error("no free address left in subnet {subnet}")]
    AddressExhausted {
        /// Canonical CIDR of the exhausted subnet.
        subnet: String,
    },

    /// A permission or capability error.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl MiniboxError {
    /// Builds an [`MiniboxError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`MiniboxError::Syscall`] from anything convertible to an OS error.
    ///
    /// `EPERM` and `EACCES` become [`MiniboxError::PermissionDenied`], since
    /// they usually mean the runtime lacks root or a capability.
    pub fn syscall(
        op: &'static str,
        path: impl Into<PathBuf>,
        source: impl Into<std::io::Error>,
    ) -> Self {
        let path = path.into();
        let source = source.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                message: format!("{op} on {}: {source}", path.display()),
            };
        }
        Self::Syscall { op, path, source }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MiniboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_error_names_operation_and_path() {
        let err = MiniboxError::syscall(
            "mount",
            "/proc",
            std::io::Error::from_raw_os_error(2),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("mount failed on /proc"));
    }

    #[test]
    fn eperm_and_eacces_become_permission_denied() {
        for errno in [1, 13] {
            let err = MiniboxError::syscall("clone", "/proc/self/exe", std::io::Error::from_raw_os_error(errno));
            let MiniboxError::PermissionDenied { message } = &err else {
                unreachable!("errno {errno} gave {err:?}");
            };
            assert!(message.starts_with("clone on /proc/self/exe: "));
            assert!(err.to_string().starts_with("permission denied: clone"));
        }
    }

    #[test]
    fn exhausted_error_mentions_subnet() {
        let err = MiniboxError::AddressExhausted {
            subnet: "10.0.0.0/30".into(),
        };
        assert_eq!(err.to_string(), "no free address left in subnet 10.0.0.0/30");
    }
}

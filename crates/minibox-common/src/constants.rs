//! System-wide constants and default paths.

/// Default directory for runtime state (records, logs, network state).
pub const DEFAULT_STATE_DIR: &str = "/var/run/minibox";

/// Default directory for image archives, layers, and overlay directories.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/minibox";

/// Environment variable overriding [`DEFAULT_STATE_DIR`].
pub const STATE_DIR_ENV: &str = "MINIBOX_STATE_DIR";

/// Environment variable overriding [`DEFAULT_DATA_DIR`].
pub const DATA_DIR_ENV: &str = "MINIBOX_DATA_DIR";

/// Environment variable carrying the target pid for namespace entry.
pub const EXEC_PID_ENV: &str = "MINIBOX_EXEC_PID";

/// Environment variable carrying the command for namespace entry.
pub const EXEC_CMD_ENV: &str = "MINIBOX_EXEC_CMD";

/// File name of a persisted container record.
pub const CONTAINER_RECORD_FILE: &str = "config.json";

/// File name of a detached container's combined stdout/stderr log.
pub const CONTAINER_LOG_FILE: &str = "container.log";

/// Path the launcher re-executes to reach the hidden `init` entrypoint.
pub const SELF_EXE: &str = "/proc/self/exe";

/// File descriptor number on which the init entrypoint reads its command.
pub const INIT_PIPE_FD: i32 = 3;

/// Prefix of every cgroup created by the runtime.
pub const CGROUP_PREFIX: &str = "minibox";

/// Name of the default network driver.
pub const BRIDGE_DRIVER: &str = "bridge";

/// Application name used in CLI output.
pub const APP_NAME: &str = "minibox";

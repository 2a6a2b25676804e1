//! Domain primitive types used across the minibox workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MiniboxError;

/// Length of a generated container identifier.
const CONTAINER_ID_LEN: usize = 10;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Generates a random ten-character hexadecimal container ID.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(CONTAINER_ID_LEN);
        Self(id)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status recorded for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The container's init process is alive.
    Running,
    /// The container was stopped by `minibox stop`.
    Stopped,
    /// The container's init process exited on its own.
    Exited,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Resource limits handed to the cgroup manager.
///
/// Values are kept as the strings the user supplied and written verbatim
/// into the controller files; an empty field leaves the host default alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Memory limit, e.g. `128m`.
    pub memory_limit: String,
    /// Relative CPU weight, e.g. `512`.
    pub cpu_shares: String,
    /// CPU list, e.g. `0-1` or `1`.
    pub cpu_set: String,
}

impl ResourceConfig {
    /// Returns `true` if no limit is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memory_limit.is_empty() && self.cpu_shares.is_empty() && self.cpu_set.is_empty()
    }
}

/// A `hostPath:containerPath` volume binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Directory on the host.
    pub host_path: String,
    /// Mount location inside the container root.
    pub container_path: String,
}

impl FromStr for VolumeSpec {
    type Err = MiniboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(':').collect::<Vec<_>>().as_slice() {
            [host, container] if !host.is_empty() && !container.is_empty() => Ok(Self {
                host_path: (*host).to_string(),
                container_path: (*container).to_string(),
            }),
            _ => Err(MiniboxError::Config {
                message: format!("volume must be hostPath:containerPath, got {s:?}"),
            }),
        }
    }
}

impl fmt::Display for VolumeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_path, self.container_path)
    }
}

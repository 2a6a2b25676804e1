//! Runtime path configuration.
//!
//! All on-disk locations used by the runtime are derived from two roots:
//! a volatile state directory and a persistent data directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration for the minibox runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Container records, logs, network records, and IPAM state.
    pub state_dir: PathBuf,
    /// Image archives, extracted layers, and overlay directories.
    pub data_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(constants::DEFAULT_STATE_DIR),
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration rooted at the given directories.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Directory holding one sub-directory per container.
    #[must_use]
    pub fn containers_dir(&self) -> PathBuf {
        self.state_dir.join("containers")
    }

    /// Directory holding a single container's record and log.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.containers_dir().join(name)
    }

    /// Path of a container's persisted record.
    #[must_use]
    pub fn container_record(&self, name: &str) -> PathBuf {
        self.container_dir(name)
            .join(constants::CONTAINER_RECORD_FILE)
    }

    /// Path of a detached container's log file.
    #[must_use]
    pub fn container_log(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(constants::CONTAINER_LOG_FILE)
    }

    /// Directory holding one JSON record per network.
    #[must_use]
    pub fn networks_dir(&self) -> PathBuf {
        self.state_dir.join("network").join("networks")
    }

    /// Path of the IPAM allocation state file.
    #[must_use]
    pub fn ipam_file(&self) -> PathBuf {
        self.state_dir
            .join("network")
            .join("ipam")
            .join("subnet.json")
    }

    /// Directory holding image archives (`<image>.tar` or `<image>.tar.gz`).
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Directory holding extracted read-only image layers.
    #[must_use]
    pub fn layers_dir(&self) -> PathBuf {
        self.data_dir.join("layers")
    }

    /// Directory holding per-container overlay directories.
    #[must_use]
    pub fn overlay_dir(&self) -> PathBuf {
        self.data_dir.join("overlay")
    }
}

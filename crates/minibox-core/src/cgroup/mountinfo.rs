//! Locating cgroup v1 controller hierarchies in the mount table.
//!
//! Each line of `/proc/self/mountinfo` looks like
//!
//! ```text
//! 39 32 0:34 / /sys/fs/cgroup/memory rw,nosuid,nodev,noexec,relatime shared:17 - cgroup cgroup rw,memory
//! ```
//!
//! The fifth field is the mount point and the last field holds the super
//! block options, which for a cgroup v1 hierarchy include the controller
//! names.

use std::path::{Path, PathBuf};

use minibox_common::error::{MiniboxError, Result};

/// Default location of the mount table.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// One parsed mount table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MountEntry {
    mount_point: PathBuf,
    super_options: Vec<String>,
}

/// Snapshot of the mount table used to resolve controller mount points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountInfo {
    entries: Vec<MountEntry>,
}

impl MountInfo {
    /// Reads and parses [`MOUNTINFO_PATH`].
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read.
    pub fn read() -> Result<Self> {
        Self::read_from(Path::new(MOUNTINFO_PATH))
    }

    /// Reads and parses a mountinfo-formatted file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MiniboxError::io(path, e))?;
        Ok(Self::parse(&text))
    }

    /// Parses mountinfo text. Malformed lines are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                let mount_point = fields.get(4)?;
                let options = fields.last()?;
                Some(MountEntry {
                    mount_point: PathBuf::from(mount_point),
                    super_options: options.split(',').map(str::to_string).collect(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Returns the mount point of the hierarchy carrying `controller`.
    #[must_use]
    pub fn controller_mount_point(&self, controller: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|e| e.super_options.iter().any(|o| o == controller))
            .map(|e| e.mount_point.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
25 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
39 32 0:34 / /sys/fs/cgroup/memory rw,nosuid,nodev,noexec,relatime shared:17 - cgroup cgroup rw,memory
40 32 0:35 / /sys/fs/cgroup/cpu,cpuacct rw,nosuid,nodev,noexec,relatime shared:18 - cgroup cgroup rw,cpu,cpuacct
41 32 0:36 / /sys/fs/cgroup/cpuset rw,nosuid,nodev,noexec,relatime shared:19 - cgroup cgroup rw,cpuset
";

    #[test]
    fn finds_controller_by_super_option() {
        let info = MountInfo::parse(SAMPLE);
        assert_eq!(
            info.controller_mount_point("memory"),
            Some(Path::new("/sys/fs/cgroup/memory"))
        );
        assert_eq!(
            info.controller_mount_point("cpu"),
            Some(Path::new("/sys/fs/cgroup/cpu,cpuacct"))
        );
        assert_eq!(
            info.controller_mount_point("cpuset"),
            Some(Path::new("/sys/fs/cgroup/cpuset"))
        );
    }

    #[test]
    fn controller_names_must_match_exactly() {
        let info = MountInfo::parse(SAMPLE);
        assert!(info.controller_mount_point("cpuacc").is_none());
        assert!(info.controller_mount_point("pids").is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let info = MountInfo::parse("garbage\n\n1 2 3\n");
        assert!(info.controller_mount_point("rw").is_none());
    }

    #[test]
    fn read_from_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(MountInfo::read_from(&dir.path().join("nope")).is_err());
    }
}

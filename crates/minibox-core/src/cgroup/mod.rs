//! Cgroups v1 resource management.
//!
//! Each controller (CPU share, CPU-set, memory) is mounted as its own
//! hierarchy. A container's resource group is the directory
//! `<controller mount point>/<group path>` in every hierarchy; creating that
//! directory creates the group.

pub mod cpu;
pub mod cpuset;
pub mod memory;
pub mod mountinfo;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ResourceConfig;

pub use mountinfo::MountInfo;

/// Name of the task-membership file inside a v1 group directory.
pub const TASKS_FILE: &str = "tasks";

/// A single resource controller.
///
/// Implementors only know their controller name, control file, and which
/// [`ResourceConfig`] field feeds it; the default methods operate on an
/// already resolved group directory.
pub trait Subsystem: fmt::Debug + Send + Sync {
    /// Controller name as it appears in the mount options (`cpu`, `memory`, ...).
    fn name(&self) -> &'static str;

    /// Control file receiving the limit value.
    fn control_file(&self) -> &'static str;

    /// The limit value for this controller; empty means "leave unset".
    fn limit<'a>(&self, res: &'a ResourceConfig) -> &'a str;

    /// Prepares a freshly created group directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be initialised.
    fn init_group(&self, _group_dir: &Path) -> Result<()> {
        Ok(())
    }

    /// Writes the configured limit into the control file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the control file cannot be written.
    fn set(&self, group_dir: &Path, res: &ResourceConfig) -> Result<()> {
        let value = self.limit(res);
        if value.is_empty() {
            return Ok(());
        }
        let file = group_dir.join(self.control_file());
        std::fs::write(&file, value).map_err(|e| MiniboxError::io(&file, e))?;
        tracing::debug!("$ echo {value} > {}", file.display());
        Ok(())
    }

    /// Appends `pid` to the group's task-membership file.
    ///
    /// # Errors
    ///
    /// Returns an error if the task file cannot be opened or written.
    fn apply(&self, group_dir: &Path, pid: i32) -> Result<()> {
        let file = group_dir.join(TASKS_FILE);
        let mut tasks = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
            .map_err(|e| MiniboxError::io(&file, e))?;
        writeln!(tasks, "{pid}").map_err(|e| MiniboxError::io(&file, e))?;
        tracing::debug!("$ echo {pid} >> {}", file.display());
        Ok(())
    }

    /// Removes the group directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    fn remove(&self, group_dir: &Path) -> Result<()> {
        // cgroupfs directories are removed with rmdir even though they list
        // control files; plain directories need the recursive fallback.
        std::fs::remove_dir(group_dir)
            .or_else(|_| std::fs::remove_dir_all(group_dir))
            .map_err(|e| MiniboxError::io(group_dir, e))?;
        tracing::debug!("$ rmdir {}", group_dir.display());
        Ok(())
    }
}

/// A resolved group directory inside one controller hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDir {
    /// Absolute path of the group directory.
    pub path: PathBuf,
    /// Whether the directory was created by this lookup.
    pub created: bool,
}

/// Resolves `<mount point of subsystem>/<group_path>`.
///
/// With `auto_create`, a missing directory is created; creating the
/// directory is what creates the group.
///
/// # Errors
///
/// Returns an error if the controller is not mounted, the directory is
/// missing and `auto_create` is false, or the directory cannot be created.
pub fn cgroup_path(
    mounts: &MountInfo,
    subsystem: &str,
    group_path: &str,
    auto_create: bool,
) -> Result<GroupDir> {
    let root = mounts
        .controller_mount_point(subsystem)
        .ok_or_else(|| MiniboxError::NotFound {
            kind: "cgroup controller",
            id: subsystem.to_string(),
        })?;
    let path = root.join(group_path);
    if path.is_dir() {
        return Ok(GroupDir {
            path,
            created: false,
        });
    }
    if !auto_create {
        return Err(MiniboxError::NotFound {
            kind: "cgroup",
            id: path.display().to_string(),
        });
    }
    std::fs::create_dir_all(&path).map_err(|e| MiniboxError::io(&path, e))?;
    tracing::debug!("$ mkdir -p {}", path.display());
    Ok(GroupDir {
        path,
        created: true,
    })
}

/// The subsystems combined for every container, in application order.
#[must_use]
pub fn default_subsystems() -> Vec<Box<dyn Subsystem>> {
    vec![
        Box::new(cpuset::CpusetSubsystem),
        Box::new(memory::MemorySubsystem),
        Box::new(cpu::CpuSubsystem),
    ]
}

/// Handle to one logical resource group across all subsystems.
///
/// The mount table is captured at construction so `set`, `apply`, and
/// `destroy` resolve the same directories for the whole container lifetime.
#[derive(Debug)]
pub struct CgroupManager {
    path: String,
    mounts: MountInfo,
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl CgroupManager {
    /// Creates a manager for `group_path` using the host mount table.
    ///
    /// # Errors
    ///
    /// Returns an error if `/proc/self/mountinfo` cannot be read.
    pub fn new(group_path: impl Into<String>) -> Result<Self> {
        Ok(Self::with_mounts(group_path, MountInfo::read()?))
    }

    /// Creates a manager resolving controllers against `mounts`.
    #[must_use]
    pub fn with_mounts(group_path: impl Into<String>, mounts: MountInfo) -> Self {
        Self {
            path: group_path.into(),
            mounts,
            subsystems: default_subsystems(),
        }
    }

    fn resolve(&self, subsystem: &dyn Subsystem, auto_create: bool) -> Result<PathBuf> {
        let dir = cgroup_path(&self.mounts, subsystem.name(), &self.path, auto_create)?;
        if dir.created {
            subsystem.init_group(&dir.path)?;
        }
        Ok(dir.path)
    }

    /// Applies `res` to every subsystem, creating the group directories.
    ///
    /// Empty fields leave the corresponding control files untouched.
    ///
    /// # Errors
    ///
    /// Returns the first resolution or write failure.
    pub fn set(&self, res: &ResourceConfig) -> Result<()> {
        for subsystem in &self.subsystems {
            let dir = self.resolve(subsystem.as_ref(), true)?;
            subsystem.set(&dir, res)?;
        }
        tracing::info!(group = %self.path, ?res, "cgroup limits set");
        Ok(())
    }

    /// Adds `pid` to the group in every subsystem.
    ///
    /// # Errors
    ///
    /// Returns the first resolution or write failure.
    pub fn apply(&self, pid: i32) -> Result<()> {
        for subsystem in &self.subsystems {
            let dir = self.resolve(subsystem.as_ref(), true)?;
            subsystem.apply(&dir, pid)?;
        }
        tracing::info!(group = %self.path, pid, "process attached to cgroup");
        Ok(())
    }

    /// Removes the group from every subsystem.
    ///
    /// Failures are logged and do not stop the remaining subsystems, so this
    /// is safe to call on a group that is already gone.
    pub fn destroy(&self) {
        for subsystem in &self.subsystems {
            let removed = cgroup_path(&self.mounts, subsystem.name(), &self.path, false)
                .and_then(|dir| subsystem.remove(&dir.path));
            if let Err(e) = removed {
                tracing::warn!(group = %self.path, subsystem = subsystem.name(), error = %e, "cgroup removal failed");
            }
        }
        tracing::info!(group = %self.path, "cgroup destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_hierarchy(root: &Path) -> MountInfo {
        let mut text = String::new();
        for (i, controller) in ["cpu", "cpuset", "memory"].iter().enumerate() {
            let dir = root.join(controller);
            std::fs::create_dir_all(&dir).unwrap();
            text.push_str(&format!(
                "{i} 1 0:{i} / {} rw,nosuid - cgroup cgroup rw,{controller}\n",
                dir.display()
            ));
        }
        MountInfo::parse(&text)
    }

    #[test]
    fn cgroup_path_without_auto_create_requires_directory() {
        let root = tempfile::tempdir().unwrap();
        let mounts = fake_hierarchy(root.path());
        assert!(cgroup_path(&mounts, "memory", "grp", false).is_err());

        let dir = cgroup_path(&mounts, "memory", "grp", true).unwrap();
        assert!(dir.created);
        assert!(dir.path.is_dir());

        let again = cgroup_path(&mounts, "memory", "grp", false).unwrap();
        assert!(!again.created);
        assert_eq!(again.path, dir.path);
    }

    #[test]
    fn cgroup_path_fails_for_unmounted_controller() {
        let root = tempfile::tempdir().unwrap();
        let mounts = fake_hierarchy(root.path());
        let err = cgroup_path(&mounts, "pids", "grp", true).unwrap_err();
        assert!(matches!(err, MiniboxError::NotFound { kind: "cgroup controller", .. }));
    }

    #[test]
    fn set_writes_only_configured_limits() {
        let root = tempfile::tempdir().unwrap();
        let manager = CgroupManager::with_mounts("grp", fake_hierarchy(root.path()));
        let res = ResourceConfig {
            memory_limit: "128m".into(),
            ..ResourceConfig::default()
        };
        manager.set(&res).unwrap();

        let limit = std::fs::read_to_string(root.path().join("memory/grp/memory.limit_in_bytes"));
        assert_eq!(limit.unwrap(), "128m");
        assert!(!root.path().join("cpu/grp/cpu.shares").exists());
        assert!(!root.path().join("cpuset/grp/cpuset.cpus").exists());
    }

    #[test]
    fn apply_appends_pid_to_every_tasks_file() {
        let root = tempfile::tempdir().unwrap();
        let manager = CgroupManager::with_mounts("grp", fake_hierarchy(root.path()));
        manager.apply(4242).unwrap();
        for controller in ["cpu", "cpuset", "memory"] {
            let tasks = std::fs::read_to_string(root.path().join(controller).join("grp/tasks"));
            assert_eq!(tasks.unwrap().trim(), "4242");
        }
    }

    #[test]
    fn destroy_twice_is_harmless() {
        let root = tempfile::tempdir().unwrap();
        let manager = CgroupManager::with_mounts("grp", fake_hierarchy(root.path()));
        manager.set(&ResourceConfig::default()).unwrap();
        manager.destroy();
        assert!(!root.path().join("memory/grp").exists());
        manager.destroy();
    }
}

//! Memory limit control via the v1 `memory` controller.

use minibox_common::types::ResourceConfig;

use super::Subsystem;

/// Writes the hard memory limit into `memory.limit_in_bytes`.
///
/// The kernel accepts suffixed values such as `128m` directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySubsystem;

impl Subsystem for MemorySubsystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn control_file(&self) -> &'static str {
        "memory.limit_in_bytes"
    }

    fn limit<'a>(&self, res: &'a ResourceConfig) -> &'a str {
        &res.memory_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_limit_leaves_control_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("memory.limit_in_bytes");
        std::fs::write(&file, "9223372036854771712").unwrap();

        MemorySubsystem
            .set(dir.path(), &ResourceConfig::default())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "9223372036854771712");
    }

    #[test]
    fn remove_deletes_group_directory() {
        let root = tempfile::tempdir().unwrap();
        let group = root.path().join("grp");
        std::fs::create_dir(&group).unwrap();
        std::fs::write(group.join("tasks"), "1\n").unwrap();

        MemorySubsystem.remove(&group).unwrap();
        assert!(!group.exists());
        assert!(MemorySubsystem.remove(&group).is_err());
    }
}

//! CPU pinning via the v1 `cpuset` controller.

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ResourceConfig;

use super::Subsystem;

/// Files a new cpuset group must have populated before tasks can join it.
const INHERITED_FILES: [&str; 2] = ["cpuset.cpus", "cpuset.mems"];

/// Writes the allowed CPU list into `cpuset.cpus`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpusetSubsystem;

impl Subsystem for CpusetSubsystem {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn control_file(&self) -> &'static str {
        "cpuset.cpus"
    }

    fn limit<'a>(&self, res: &'a ResourceConfig) -> &'a str {
        &res.cpu_set
    }

    /// Copies the parent's CPU and memory-node lists into an empty group.
    ///
    /// A v1 cpuset group starts with both lists empty and refuses tasks until
    /// they are filled in.
    fn init_group(&self, group_dir: &Path) -> Result<()> {
        let Some(parent) = group_dir.parent() else {
            return Ok(());
        };
        for name in INHERITED_FILES {
            let own = group_dir.join(name);
            let current = std::fs::read_to_string(&own).unwrap_or_default();
            if !current.trim().is_empty() {
                continue;
            }
            let Ok(inherited) = std::fs::read_to_string(parent.join(name)) else {
                continue;
            };
            let inherited = inherited.trim();
            if inherited.is_empty() {
                continue;
            }
            std::fs::write(&own, inherited).map_err(|e| MiniboxError::io(&own, e))?;
            tracing::debug!("$ echo {inherited} > {}", own.display());
        }
        Ok(())
    }
}

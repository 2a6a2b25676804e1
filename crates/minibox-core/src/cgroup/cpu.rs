//! CPU share control via the v1 `cpu` controller.

use minibox_common::types::ResourceConfig;

use super::Subsystem;

/// Writes the relative CPU weight into `cpu.shares`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuSubsystem;

impl Subsystem for CpuSubsystem {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn control_file(&self) -> &'static str {
        "cpu.shares"
    }

    fn limit<'a>(&self, res: &'a ResourceConfig) -> &'a str {
        &res.cpu_shares
    }
}

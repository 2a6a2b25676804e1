//! Union mounts for layered container filesystems.
//!
//! The workspace only needs three operations from the host: stack a writable
//! layer over read-only layers, expose a host directory at a path, and
//! detach a mount. [`UnionFs`] captures that surface; [`OverlayFs`]
//! implements it with the kernel's `overlay` filesystem.

use std::path::{Path, PathBuf};

use minibox_common::error::{MiniboxError, Result};

/// Directories composing one layered mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Read-only lower layers, top-most first.
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Scratch directory required by `OverlayFS`, on the same filesystem as `upper_dir`.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

impl OverlayConfig {
    /// Renders the `lowerdir=...,upperdir=...,workdir=...` mount data.
    #[must_use]
    pub fn mount_data(&self) -> String {
        let lowers = self
            .lower_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        format!(
            "lowerdir={},upperdir={},workdir={}",
            lowers,
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }
}

/// Capability to compose and tear down container filesystem views.
pub trait UnionFs: std::fmt::Debug {
    /// Mounts the layered view described by `config` at `config.merged_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_layered(&self, config: &OverlayConfig) -> Result<()>;

    /// Exposes `source` read-write at `target`, bypassing any layering.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_volume(&self, source: &Path, target: &Path) -> Result<()>;

    /// Forcibly detaches whatever is mounted at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// [`UnionFs`] backed by the kernel `overlay` filesystem and bind mounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayFs;

impl UnionFs for OverlayFs {
    fn mount_layered(&self, config: &OverlayConfig) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        for dir in [&config.upper_dir, &config.work_dir, &config.merged_dir] {
            std::fs::create_dir_all(dir).map_err(|e| MiniboxError::io(dir, e))?;
        }

        let data = config.mount_data();
        mount(
            Some("overlay"),
            &config.merged_dir,
            Some("overlay"),
            MsFlags::empty(),
            Some(data.as_str()),
        )
        .map_err(|e| MiniboxError::syscall("mount overlay", &config.merged_dir, e))?;

        tracing::debug!("$ mount -t overlay -o {data} overlay {}", config.merged_dir.display());
        tracing::info!(merged = %config.merged_dir.display(), "overlayfs mounted");
        Ok(())
    }

    fn mount_volume(&self, source: &Path, target: &Path) -> Result<()> {
        super::mount::bind_mount(source, target)?;
        tracing::info!(source = %source.display(), target = %target.display(), "volume mounted");
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH)
            .map_err(|e| MiniboxError::syscall("umount", target, e))?;
        tracing::debug!("$ umount -l {}", target.display());
        Ok(())
    }
}

//! Per-container root filesystem composition.
//!
//! A container root stacks three pieces:
//!
//! - the image's read-only layer, shared by every container of that image,
//! - a per-container writable layer (`upper`, plus the overlay `work` dir),
//! - the merged mount point the container pivots into.
//!
//! An optional `hostPath:containerPath` volume is mounted on top of the
//! merged view and bypasses the layering entirely.

use std::path::{Path, PathBuf};

use minibox_common::config::RuntimeConfig;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::VolumeSpec;

use super::layer::ensure_image_layer;
use super::overlayfs::{OverlayConfig, OverlayFs, UnionFs};

/// Directory roots used to lay out workspaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    /// Image archives.
    pub images_dir: PathBuf,
    /// Extracted read-only layers.
    pub layers_dir: PathBuf,
    /// Per-container overlay directories.
    pub overlay_dir: PathBuf,
}

impl WorkspaceLayout {
    /// Derives the layout from the runtime configuration.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            images_dir: config.images_dir(),
            layers_dir: config.layers_dir(),
            overlay_dir: config.overlay_dir(),
        }
    }

    /// Overlay configuration for container `name` running `image`.
    #[must_use]
    pub fn overlay_config(&self, name: &str, image: &str) -> OverlayConfig {
        let base = self.overlay_dir.join(name);
        OverlayConfig {
            lower_dirs: vec![self.layers_dir.join(image)],
            upper_dir: base.join("upper"),
            work_dir: base.join("work"),
            merged_dir: base.join("merged"),
        }
    }

    /// Merged mount point of container `name`.
    #[must_use]
    pub fn merged_dir(&self, name: &str) -> PathBuf {
        self.overlay_dir.join(name).join("merged")
    }
}

/// Location of a volume inside a merged root.
fn volume_target(merged: &Path, volume: &VolumeSpec) -> PathBuf {
    merged.join(volume.container_path.trim_start_matches('/'))
}

/// Builds and tears down container root filesystems.
#[derive(Debug)]
pub struct Workspace<F: UnionFs = OverlayFs> {
    layout: WorkspaceLayout,
    fs: F,
}

impl Workspace<OverlayFs> {
    /// Creates a workspace manager using the kernel overlay filesystem.
    #[must_use]
    pub const fn new(layout: WorkspaceLayout) -> Self {
        Self {
            layout,
            fs: OverlayFs,
        }
    }
}

impl<F: UnionFs> Workspace<F> {
    /// Creates a workspace manager on top of a custom union filesystem.
    pub const fn with_fs(layout: WorkspaceLayout, fs: F) -> Self {
        Self { layout, fs }
    }

    /// Materialises the root filesystem of container `name` and returns the
    /// merged mount point.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be extracted or a directory or
    /// mount cannot be created. A failed mount leaves no overlay directories
    /// behind; a failed volume mount detaches the merged root first.
    pub fn create(&self, name: &str, image: &str, volume: Option<&VolumeSpec>) -> Result<PathBuf> {
        let _ = ensure_image_layer(&self.layout.images_dir, &self.layout.layers_dir, image)?;

        let overlay = self.layout.overlay_config(name, image);
        let layered = [&overlay.upper_dir, &overlay.work_dir, &overlay.merged_dir]
            .into_iter()
            .try_for_each(|dir| std::fs::create_dir_all(dir).map_err(|e| MiniboxError::io(dir, e)))
            .and_then(|()| self.fs.mount_layered(&overlay));
        if let Err(e) = layered {
            self.remove_write_layer(name);
            return Err(e);
        }

        if let Some(volume) = volume {
            if let Err(e) = self.mount_volume(&overlay.merged_dir, volume) {
                if let Err(undo) = self.fs.unmount(&overlay.merged_dir) {
                    tracing::error!(error = %undo, "failed to detach root after volume error");
                } else {
                    self.remove_write_layer(name);
                }
                return Err(e);
            }
        }

        tracing::info!(container = name, image, root = %overlay.merged_dir.display(), "workspace ready");
        Ok(overlay.merged_dir)
    }

    fn mount_volume(&self, merged: &Path, volume: &VolumeSpec) -> Result<()> {
        let host = PathBuf::from(&volume.host_path);
        std::fs::create_dir_all(&host).map_err(|e| MiniboxError::io(&host, e))?;
        let target = volume_target(merged, volume);
        std::fs::create_dir_all(&target).map_err(|e| MiniboxError::io(&target, e))?;
        self.fs.mount_volume(&host, &target)
    }

    /// Tears down the root filesystem of container `name`.
    ///
    /// Unmounts the volume before the merged root, then removes the
    /// container's overlay directories. Every failure is logged and the
    /// remaining steps still run.
    pub fn delete(&self, name: &str, volume: Option<&VolumeSpec>) {
        let merged = self.layout.merged_dir(name);

        if let Some(volume) = volume {
            let target = volume_target(&merged, volume);
            if let Err(e) = self.fs.unmount(&target) {
                tracing::error!(target = %target.display(), error = %e, "volume unmount failed");
            }
        }
        if let Err(e) = self.fs.unmount(&merged) {
            tracing::error!(target = %merged.display(), error = %e, "root unmount failed");
        }

        self.remove_write_layer(name);
        tracing::info!(container = name, "workspace removed");
    }

    fn remove_write_layer(&self, name: &str) {
        let base = self.layout.overlay_dir.join(name);
        match std::fs::remove_dir_all(&base) {
            Ok(()) => tracing::debug!("$ rm -rf {}", base.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(path = %base.display(), error = %e, "write layer removal failed"),
        }
    }
}

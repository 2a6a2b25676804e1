//! Mount utilities used inside the container's mount namespace.

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};
use nix::mount::{MsFlags, mount};

/// Makes every mount below `/` private (`mount --make-rprivate /`).
///
/// Mount and unmount events in the new namespace then no longer propagate
/// back to the host's mount table.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn make_rprivate() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| MiniboxError::syscall("mount --make-rprivate", "/", e))?;
    tracing::debug!("$ mount --make-rprivate /");
    Ok(())
}

/// Recursively bind-mounts `source` onto `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    mount(
        Some(source),
        target,
        Some("bind"),
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| MiniboxError::syscall("mount --rbind", target, e))?;
    tracing::debug!("$ mount --rbind {} {}", source.display(), target.display());
    Ok(())
}

/// Mounts a fresh `proc` at `/proc` showing the current PID namespace.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn mount_proc() -> Result<()> {
    let target = Path::new("/proc");
    std::fs::create_dir_all(target).map_err(|e| MiniboxError::io(target, e))?;
    mount(
        Some("proc"),
        target,
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|e| MiniboxError::syscall("mount proc", target, e))?;
    tracing::debug!("$ mount -t proc -o noexec,nosuid,nodev proc /proc");
    Ok(())
}

/// Mounts a private `tmpfs` at `/dev` with mode 0755.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn mount_dev() -> Result<()> {
    let target = Path::new("/dev");
    std::fs::create_dir_all(target).map_err(|e| MiniboxError::io(target, e))?;
    mount(
        Some("tmpfs"),
        target,
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        Some("mode=755"),
    )
    .map_err(|e| MiniboxError::syscall("mount tmpfs", target, e))?;
    tracing::debug!("$ mount -t tmpfs -o nosuid,strictatime,mode=755 tmpfs /dev");
    Ok(())
}

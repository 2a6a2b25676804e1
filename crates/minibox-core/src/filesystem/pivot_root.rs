//! Secure root filesystem switching via `pivot_root(2)`.
//!
//! More thorough than `chroot` because the old root is detached from the
//! namespace entirely instead of merely being hidden from path lookups.

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};
use nix::mount::{MntFlags, umount2};
use nix::unistd::{chdir, pivot_root as sys_pivot_root};

use super::mount::bind_mount;

/// Directory, relative to the new root, that temporarily holds the old root.
const PUT_OLD: &str = ".pivot_root";

/// Makes `new_root` the process root and detaches the old root.
///
/// `new_root` is first bind-mounted onto itself so it is a mount point
/// distinct from the old root, as `pivot_root(2)` requires. Mount
/// propagation must already be private.
///
/// # Errors
///
/// Returns an error if any step fails; the namespace is then in an
/// unusable state and the caller must abort.
pub fn pivot_root(new_root: &Path) -> Result<()> {
    tracing::info!(new_root = %new_root.display(), "performing pivot_root");

    bind_mount(new_root, new_root)?;

    let put_old = new_root.join(PUT_OLD);
    std::fs::create_dir_all(&put_old).map_err(|e| MiniboxError::io(&put_old, e))?;

    sys_pivot_root(new_root, &put_old)
        .map_err(|e| MiniboxError::syscall("pivot_root", new_root, e))?;
    tracing::debug!("$ pivot_root {} {}", new_root.display(), put_old.display());

    chdir("/").map_err(|e| MiniboxError::syscall("chdir", "/", e))?;

    let old_root = Path::new("/").join(PUT_OLD);
    umount2(&old_root, MntFlags::MNT_DETACH)
        .map_err(|e| MiniboxError::syscall("umount", &old_root, e))?;
    std::fs::remove_dir(&old_root).map_err(|e| MiniboxError::io(&old_root, e))?;
    tracing::debug!("$ umount -l {0} && rmdir {0}", old_root.display());
    Ok(())
}

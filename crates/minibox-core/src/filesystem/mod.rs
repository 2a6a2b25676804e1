//! Filesystem management for container isolation.
//!
//! Provides the layered container root (image layer, write layer, merged
//! `OverlayFS` mount, optional volume), `pivot_root` for switching into it,
//! and the pseudo-filesystem mounts performed inside the new namespace.

pub mod layer;
pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
pub mod workspace;

//! # minibox-core
//!
//! Low-level Linux isolation primitives for the minibox runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: clone flags for new containers and `setns(2)` joins.
//! - **Cgroups v1**: CPU share, CPU-set, and memory subsystems behind one manager.
//! - **Filesystem**: `OverlayFS` workspaces, image layer extraction, and `pivot_root`.
//!
//! Every syscall failure is reported as a [`minibox_common::error::MiniboxError`]
//! naming the operation and the path it was applied to.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;

//! Container lifecycle management for the minibox runtime.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod container;
pub mod engine;
pub mod entry;
pub mod exec;
pub mod init;
pub mod logs;
pub mod process;
pub mod state;

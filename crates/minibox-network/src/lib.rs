//! # minibox-network
//!
//! Container networking for the minibox runtime.
//!
//! - **Store**: the explicit registry of networks and drivers, loaded from disk.
//! - **IPAM**: a persisted per-subnet allocation bitmap.
//! - **Drivers**: the [`driver::NetworkDriver`] capability and its Linux bridge implementation.
//! - **Endpoints**: veth wiring, in-namespace address/route setup, and port mapping.
//!
//! Host configuration is performed through the `ip` and `iptables` tools;
//! every invocation is logged at `debug` as a `$ ...` line.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bridge;
pub mod command;
pub mod driver;
pub mod endpoint;
pub mod firewall;
pub mod ipam;
pub mod link;
pub mod netns;
pub mod network;
pub mod store;

pub use endpoint::{ConnectRequest, Endpoint};
pub use network::Network;
pub use store::NetworkStore;

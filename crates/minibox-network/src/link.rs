//! Link, address, and route configuration through `ip(8)`.
//!
//! Every function acts on the network namespace of the calling thread;
//! child processes inherit the namespace of the thread that spawned them.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use minibox_common::error::Result;

use crate::command;

const IP: &str = "ip";

/// Returns `true` if a link named `name` exists.
#[must_use]
pub fn exists(name: &str) -> bool {
    command::run(IP, &["link", "show", "dev", name]).is_ok()
}

/// Creates a bridge device named `name`.
///
/// # Errors
///
/// Returns an error if `ip link add` fails.
pub fn add_bridge(name: &str) -> Result<()> {
    command::run(IP, &["link", "add", name, "type", "bridge"]).map(drop)
}

/// Creates a veth pair and enslaves `host` to `bridge`.
///
/// # Errors
///
/// Returns an error if the pair cannot be created or attached.
pub fn add_veth(host: &str, peer: &str, bridge: &str) -> Result<()> {
    command::run(IP, &["link", "add", host, "type", "veth", "peer", "name", peer])?;
    command::run(IP, &["link", "set", "dev", host, "master", bridge]).map(drop)
}

/// Brings link `name` up.
///
/// # Errors
///
/// Returns an error if `ip link set up` fails.
pub fn set_up(name: &str) -> Result<()> {
    command::run(IP, &["link", "set", "dev", name, "up"]).map(drop)
}

/// Assigns `address` (address plus prefix) to link `name`.
///
/// # Errors
///
/// Returns an error if `ip addr add` fails.
pub fn add_address(name: &str, address: Ipv4Network) -> Result<()> {
    let address = address.to_string();
    command::run(IP, &["addr", "add", &address, "dev", name]).map(drop)
}

/// Moves link `name` into the network namespace of process `pid`.
///
/// # Errors
///
/// Returns an error if `ip link set netns` fails.
pub fn move_to_netns(name: &str, pid: i32) -> Result<()> {
    let pid = pid.to_string();
    command::run(IP, &["link", "set", "dev", name, "netns", &pid]).map(drop)
}

/// Installs a default route through `gateway` on link `name`.
///
/// # Errors
///
/// Returns an error if `ip route add` fails.
pub fn add_default_route(gateway: Ipv4Addr, name: &str) -> Result<()> {
    let gateway = gateway.to_string();
    command::run(IP, &["route", "add", "default", "via", &gateway, "dev", name]).map(drop)
}

/// Deletes link `name`. Deleting one end of a veth pair removes both.
///
/// # Errors
///
/// Returns an error if `ip link delete` fails.
pub fn delete(name: &str) -> Result<()> {
    command::run(IP, &["link", "delete", name]).map(drop)
}

//! NAT rules installed with `iptables(8)`.
//!
//! Two kinds of rule are managed, both in the `nat` table:
//!
//! - a `POSTROUTING` masquerade per network so bridge traffic can leave the host,
//! - a `PREROUTING` DNAT per port mapping forwarding a host port to a container.
//!
//! Rules are built as argument vectors first so the exact text can be
//! checked without touching the host.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use minibox_common::error::{MiniboxError, Result};

use crate::command;

const IPTABLES: &str = "iptables";

/// Whether a rule is appended or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// `-A`
    Append,
    /// `-D`
    Delete,
}

impl RuleAction {
    const fn flag(self) -> &'static str {
        match self {
            Self::Append => "-A",
            Self::Delete => "-D",
        }
    }
}

/// A `hostPort:containerPort` forwarding entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port opened on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

impl FromStr for PortMapping {
    type Err = MiniboxError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MiniboxError::Config {
            message: format!("port mapping must be hostPort:containerPort, got {s:?}"),
        };
        let (host, container) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            host_port: host.parse().map_err(|_| invalid())?,
            container_port: container.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_port, self.container_port)
    }
}

/// Arguments of the masquerade rule for traffic from `subnet` leaving
/// through any interface other than `bridge`.
#[must_use]
pub fn masquerade_args(action: RuleAction, subnet: Ipv4Network, bridge: &str) -> Vec<String> {
    [
        "-t",
        "nat",
        action.flag(),
        "POSTROUTING",
        "-s",
        &subnet.to_string(),
        "!",
        "-o",
        bridge,
        "-j",
        "MASQUERADE",
    ]
    .map(str::to_string)
    .to_vec()
}

/// Arguments of the DNAT rule forwarding `mapping` to `ip`.
#[must_use]
pub fn dnat_args(action: RuleAction, mapping: PortMapping, ip: Ipv4Addr) -> Vec<String> {
    [
        "-t",
        "nat",
        action.flag(),
        "PREROUTING",
        "-p",
        "tcp",
        "-m",
        "tcp",
        "--dport",
        &mapping.host_port.to_string(),
        "-j",
        "DNAT",
        "--to-destination",
        &format!("{ip}:{}", mapping.container_port),
    ]
    .map(str::to_string)
    .to_vec()
}

fn iptables(args: &[String]) -> Result<()> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    command::run(IPTABLES, &args).map(drop)
}

/// Appends or deletes the masquerade rule of a network.
///
/// # Errors
///
/// Returns an error if `iptables` fails.
pub fn masquerade(action: RuleAction, subnet: Ipv4Network, bridge: &str) -> Result<()> {
    iptables(&masquerade_args(action, subnet, bridge))
}

/// Appends or deletes one DNAT rule per entry of `mappings`.
///
/// Malformed entries and failing rules are logged and skipped; the
/// remaining entries are still processed. Returns how many rules were
/// applied.
pub fn port_mappings(action: RuleAction, mappings: &[String], ip: Ipv4Addr) -> usize {
    mappings
        .iter()
        .filter(|raw| {
            let mapping = match raw.parse::<PortMapping>() {
                Ok(m) => m,
                Err(e) => {
                    tracing::error!(mapping = %raw, error = %e, "skipping port mapping");
                    return false;
                }
            };
            match iptables(&dnat_args(action, mapping, ip)) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(%mapping, error = %e, "port mapping rule failed");
                    false
                }
            }
        })
        .count()
}

//! Container endpoints: one veth pair and one address on one network.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use minibox_common::error::{MiniboxError, Result};

use crate::firewall::{self, RuleAction};
use crate::network::Network;
use crate::{link, netns};

/// Characters of the endpoint id used in device names.
const DEVICE_ID_LEN: usize = 5;

/// Prefix of the container-side veth device.
const PEER_PREFIX: &str = "cif-";

/// Loopback device brought up in every container namespace.
const LOOPBACK: &str = "lo";

/// What the network layer needs to know about a container.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest<'a> {
    /// Container identifier.
    pub container_id: &'a str,
    /// Host pid of the container's init process.
    pub pid: i32,
    /// `hostPort:containerPort` entries to forward.
    pub port_mapping: &'a [String],
}

/// The two ends of a veth pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// End attached to the bridge, left in the host namespace.
    pub host_name: String,
    /// End moved into the container namespace.
    pub peer_name: String,
}

impl VethPair {
    /// Device names derived from an endpoint id.
    #[must_use]
    pub fn for_endpoint(endpoint_id: &str) -> Self {
        let short: String = endpoint_id.chars().take(DEVICE_ID_LEN).collect();
        Self {
            peer_name: format!("{PEER_PREFIX}{short}"),
            host_name: short,
        }
    }
}

/// A container's attachment to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `<container id>-<network name>`.
    pub id: String,
    /// The network the endpoint belongs to.
    pub network: Network,
    /// Address allocated to the container.
    pub ip_address: Ipv4Addr,
    /// Veth device names.
    pub device: VethPair,
    /// Forwarded ports.
    pub port_mapping: Vec<String>,
}

impl Endpoint {
    /// Describes the endpoint of `container_id` on `network` at `ip_address`.
    #[must_use]
    pub fn new(
        container_id: &str,
        network: &Network,
        ip_address: Ipv4Addr,
        port_mapping: &[String],
    ) -> Self {
        let id = format!("{container_id}-{}", network.name);
        Self {
            device: VethPair::for_endpoint(&id),
            id,
            network: network.clone(),
            ip_address,
            port_mapping: port_mapping.to_vec(),
        }
    }

    /// The container-side interface address, e.g. `192.168.0.2/24`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is invalid.
    pub fn interface_address(&self) -> Result<Ipv4Network> {
        Ipv4Network::new(self.ip_address, self.network.ip_range.prefix()).map_err(|e| {
            MiniboxError::Config {
                message: e.to_string(),
            }
        })
    }

    /// Moves the peer device into the namespace of `pid` and configures it
    /// there: address, link up, loopback up, default route via the gateway.
    ///
    /// The configuration runs on a dedicated thread that leaves the host
    /// namespace only for the duration of the call.
    ///
    /// # Errors
    ///
    /// Returns the first failing step.
    pub fn configure_in_namespace(&self, pid: i32) -> Result<()> {
        let address = self.interface_address()?;
        let peer = self.device.peer_name.as_str();
        let gateway = self.network.gateway();

        link::move_to_netns(peer, pid)?;
        netns::run_in_netns(pid, || {
            link::add_address(peer, address)?;
            link::set_up(peer)?;
            link::set_up(LOOPBACK)?;
            link::add_default_route(gateway, peer)
        })?;
        tracing::info!(endpoint = %self.id, %address, %gateway, pid, "endpoint configured");
        Ok(())
    }

    /// Installs the endpoint's DNAT rules. Returns the number applied.
    pub fn map_ports(&self) -> usize {
        firewall::port_mappings(RuleAction::Append, &self.port_mapping, self.ip_address)
    }

    /// Removes the endpoint's DNAT rules. Returns the number removed.
    pub fn unmap_ports(&self) -> usize {
        firewall::port_mappings(RuleAction::Delete, &self.port_mapping, self.ip_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testnet() -> Network {
        Network {
            name: "testnet".into(),
            ip_range: "192.168.0.1/24".parse().unwrap(),
            driver: "bridge".into(),
        }
    }

    #[test]
    fn device_names_use_endpoint_prefix() {
        let ep = Endpoint::new("a1b2c3d4e5", &testnet(), Ipv4Addr::new(192, 168, 0, 2), &[]);
        assert_eq!(ep.id, "a1b2c3d4e5-testnet");
        assert_eq!(ep.device.host_name, "a1b2c");
        assert_eq!(ep.device.peer_name, "cif-a1b2c");
    }

    #[test]
    fn short_ids_keep_whole_id() {
        let pair = VethPair::for_endpoint("ab");
        assert_eq!(pair.host_name, "ab");
        assert_eq!(pair.peer_name, "cif-ab");
    }

    #[test]
    fn interface_address_carries_subnet_prefix() {
        let ep = Endpoint::new("abcdef", &testnet(), Ipv4Addr::new(192, 168, 0, 2), &[]);
        assert_eq!(ep.interface_address().unwrap().to_string(), "192.168.0.2/24");
    }
}

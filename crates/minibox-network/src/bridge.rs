//! Linux bridge network driver.
//!
//! Each network is a bridge device named after the network, holding the
//! gateway address. Containers attach through veth pairs whose host end is
//! enslaved to the bridge. Outbound traffic is masqueraded.

use ipnetwork::Ipv4Network;
use minibox_common::constants::BRIDGE_DRIVER;
use minibox_common::error::Result;

use crate::driver::NetworkDriver;
use crate::endpoint::Endpoint;
use crate::firewall::{self, RuleAction};
use crate::link;
use crate::network::Network;

/// Driver backed by a Linux bridge and iptables masquerading.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeDriver;

impl BridgeDriver {
    fn init_bridge(network: &Network) -> Result<()> {
        let name = network.name.as_str();
        if link::exists(name) {
            tracing::info!(bridge = name, "bridge already exists");
        } else {
            link::add_bridge(name)?;
            link::add_address(name, network.ip_range)?;
            link::set_up(name)?;
        }
        firewall::masquerade(RuleAction::Append, network.subnet(), name)
    }
}

impl NetworkDriver for BridgeDriver {
    fn name(&self) -> &'static str {
        BRIDGE_DRIVER
    }

    fn create(&self, ip_range: Ipv4Network, name: &str) -> Result<Network> {
        let network = Network {
            name: name.to_string(),
            ip_range,
            driver: self.name().to_string(),
        };
        Self::init_bridge(&network)?;
        tracing::info!(network = name, %ip_range, "bridge network created");
        Ok(network)
    }

    fn delete(&self, network: &Network) -> Result<()> {
        if let Err(e) = firewall::masquerade(RuleAction::Delete, network.subnet(), &network.name) {
            tracing::warn!(network = %network.name, error = %e, "masquerade rule removal failed");
        }
        if link::exists(&network.name) {
            link::delete(&network.name)?;
        } else {
            tracing::warn!(network = %network.name, "bridge already gone");
        }
        tracing::info!(network = %network.name, "bridge network deleted");
        Ok(())
    }

    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()> {
        let veth = &endpoint.device;
        link::add_veth(&veth.host_name, &veth.peer_name, &network.name)?;
        link::set_up(&veth.host_name)?;
        tracing::info!(
            endpoint = %endpoint.id,
            host = %veth.host_name,
            peer = %veth.peer_name,
            bridge = %network.name,
            "veth pair attached"
        );
        Ok(())
    }

    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> Result<()> {
        link::delete(&endpoint.device.host_name)?;
        tracing::info!(endpoint = %endpoint.id, bridge = %network.name, "veth pair removed");
        Ok(())
    }
}

//! The network registry.
//!
//! [`NetworkStore::load`] registers the available drivers and reads every
//! persisted network record. All network operations go through the
//! returned store; nothing is kept in process-wide state.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use ipnetwork::Ipv4Network;
use minibox_common::config::RuntimeConfig;
use minibox_common::error::{MiniboxError, Result};

use crate::bridge::BridgeDriver;
use crate::driver::NetworkDriver;
use crate::endpoint::{ConnectRequest, Endpoint};
use crate::ipam::{self, Ipam};
use crate::network::{self, Network};

/// The drivers registered by [`NetworkStore::load`].
#[must_use]
pub fn default_drivers() -> Vec<Box<dyn NetworkDriver>> {
    vec![Box::new(BridgeDriver)]
}

/// Loaded networks, drivers, and the address allocator.
#[derive(Debug)]
pub struct NetworkStore {
    networks_dir: PathBuf,
    ipam: Ipam,
    networks: BTreeMap<String, Network>,
    drivers: HashMap<&'static str, Box<dyn NetworkDriver>>,
}

impl NetworkStore {
    /// Loads every network recorded under the configured state directory,
    /// with the bridge driver registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the network directory cannot be created or read.
    pub fn load(config: &RuntimeConfig) -> Result<Self> {
        Self::load_with_drivers(config, default_drivers())
    }

    /// Loads the store with an explicit set of drivers.
    ///
    /// Unreadable records are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the network directory cannot be created or read.
    pub fn load_with_drivers(
        config: &RuntimeConfig,
        drivers: Vec<Box<dyn NetworkDriver>>,
    ) -> Result<Self> {
        let networks_dir = config.networks_dir();
        std::fs::create_dir_all(&networks_dir).map_err(|e| MiniboxError::io(&networks_dir, e))?;

        let mut networks = BTreeMap::new();
        let entries =
            std::fs::read_dir(&networks_dir).map_err(|e| MiniboxError::io(&networks_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| MiniboxError::io(&networks_dir, e))?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Network::load(&path) {
                Ok(nw) => {
                    tracing::debug!(network = %nw.name, "network loaded");
                    let _ = networks.insert(nw.name.clone(), nw);
                }
                Err(e) => tracing::error!(path = %path.display(), error = %e, "skipping network record"),
            }
        }

        let drivers = drivers.into_iter().map(|d| (d.name(), d)).collect();
        Ok(Self {
            networks_dir,
            ipam: Ipam::new(config.ipam_file()),
            networks,
            drivers,
        })
    }

    /// The address allocator.
    #[must_use]
    pub const fn ipam(&self) -> &Ipam {
        &self.ipam
    }

    /// All known networks, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    /// Looks up a network by name.
    ///
    /// # Errors
    ///
    /// Returns [`MiniboxError::NotFound`] if no such network exists.
    pub fn get(&self, name: &str) -> Result<&Network> {
        self.networks.get(name).ok_or_else(|| MiniboxError::NotFound {
            kind: "network",
            id: name.to_string(),
        })
    }

    fn driver(&self, name: &str) -> Result<&dyn NetworkDriver> {
        self.drivers
            .get(name)
            .map(|d| &**d)
            .ok_or_else(|| MiniboxError::NotFound {
                kind: "network driver",
                id: name.to_string(),
            })
    }

    /// Creates network `name` over `subnet` with `driver`.
    ///
    /// The first host address of the subnet is allocated as the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or taken, the subnet or
    /// driver is invalid, or the driver fails; the gateway address is
    /// released again on driver failure.
    pub fn create_network(&mut self, driver: &str, subnet: &str, name: &str) -> Result<&Network> {
        network::validate_name(name)?;
        if self.networks.contains_key(name) {
            return Err(MiniboxError::Config {
                message: format!("network {name} already exists"),
            });
        }
        let subnet: Ipv4Network = subnet.parse().map_err(|e| MiniboxError::Config {
            message: format!("invalid subnet {subnet:?}: {e}"),
        })?;
        let subnet = ipam::canonical(subnet)?;
        let driver = self.driver(driver)?;

        let gateway = self.ipam.allocate(subnet)?;
        let created = Ipv4Network::new(gateway, subnet.prefix())
            .map_err(|e| MiniboxError::Config {
                message: e.to_string(),
            })
            .and_then(|ip_range| driver.create(ip_range, name))
            .and_then(|nw| nw.dump(&self.networks_dir).map(|()| nw));
        let network = match created {
            Ok(nw) => nw,
            Err(e) => {
                if let Err(undo) = self.ipam.release(subnet, gateway) {
                    tracing::error!(error = %undo, "failed to release gateway address");
                }
                return Err(e);
            }
        };

        tracing::info!(network = name, %gateway, "network created");
        Ok(self.networks.entry(name.to_string()).or_insert(network))
    }

    /// Removes network `name`: deletes the driver's host devices, releases
    /// its gateway, and removes the record.
    ///
    /// The gateway stays allocated and the network stays registered while
    /// the driver refuses the delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unknown or a step fails.
    pub fn delete_network(&mut self, name: &str) -> Result<()> {
        let network = self.get(name)?.clone();
        self.driver(&network.driver)?.delete(&network)?;
        self.ipam.release(network.subnet(), network.gateway())?;
        network.remove(&self.networks_dir)?;
        let _ = self.networks.remove(name);
        tracing::info!(network = name, "network removed");
        Ok(())
    }

    /// Connects a container to network `name` and returns its endpoint.
    ///
    /// Allocates an address, lets the driver create the veth pair, configures
    /// the container side inside its network namespace, and installs the
    /// port mappings. On failure the address and devices are released again.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unknown, allocation fails, or the
    /// devices cannot be created or configured.
    pub fn connect(&self, name: &str, request: &ConnectRequest<'_>) -> Result<Endpoint> {
        let network = self.get(name)?;
        let driver = self.driver(&network.driver)?;
        let ip = self.ipam.allocate(network.subnet())?;
        let endpoint = Endpoint::new(request.container_id, network, ip, request.port_mapping);

        if let Err(e) = driver.connect(network, &endpoint) {
            self.release_quietly(network, ip);
            return Err(e);
        }
        if let Err(e) = endpoint.configure_in_namespace(request.pid) {
            if let Err(undo) = driver.disconnect(network, &endpoint) {
                tracing::error!(endpoint = %endpoint.id, error = %undo, "failed to remove veth pair");
            }
            self.release_quietly(network, ip);
            return Err(e);
        }

        let mapped = endpoint.map_ports();
        tracing::info!(
            endpoint = %endpoint.id,
            %ip,
            ports = mapped,
            "container connected"
        );
        Ok(endpoint)
    }

    /// Disconnects a container that was given `ip` on network `name`.
    ///
    /// Removes its port mappings and host veth and releases the address.
    /// Individual failures are logged; the remaining steps still run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the network or its driver is unknown.
    pub fn disconnect(&self, name: &str, container_id: &str, ip: Ipv4Addr, port_mapping: &[String]) -> Result<()> {
        let network = self.get(name)?;
        let driver = self.driver(&network.driver)?;
        let endpoint = Endpoint::new(container_id, network, ip, port_mapping);

        let _ = endpoint.unmap_ports();
        if let Err(e) = driver.disconnect(network, &endpoint) {
            tracing::warn!(endpoint = %endpoint.id, error = %e, "veth removal failed");
        }
        self.release_quietly(network, ip);
        tracing::info!(endpoint = %endpoint.id, "container disconnected");
        Ok(())
    }

    fn release_quietly(&self, network: &Network, ip: Ipv4Addr) {
        if let Err(e) = self.ipam.release(network.subnet(), ip) {
            tracing::error!(network = %network.name, %ip, error = %e, "address release failed");
        }
    }
}

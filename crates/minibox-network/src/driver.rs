//! The network driver capability.

use ipnetwork::Ipv4Network;
use minibox_common::error::Result;

use crate::endpoint::Endpoint;
use crate::network::Network;

/// Strategy for creating networks and wiring endpoints into them.
pub trait NetworkDriver: std::fmt::Debug + Send + Sync {
    /// Driver name stored in network records.
    fn name(&self) -> &'static str;

    /// Creates the host side of network `name`.
    ///
    /// `ip_range` is the gateway address with the subnet prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if host devices or rules cannot be set up.
    fn create(&self, ip_range: Ipv4Network, name: &str) -> Result<Network>;

    /// Removes the host side of `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if host devices cannot be removed.
    fn delete(&self, network: &Network) -> Result<()>;

    /// Creates the endpoint's devices and attaches them to `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if the devices cannot be created.
    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;

    /// Removes the endpoint's host-side devices.
    ///
    /// # Errors
    ///
    /// Returns an error if the devices cannot be removed.
    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;
}

//! Subnet IP address management.
//!
//! Allocation state is a JSON object mapping a subnet's canonical CIDR to a
//! string of `'0'`/`'1'` characters, one per host offset in the subnet:
//!
//! ```json
//! {"192.168.0.0/24": "01100000...0"}
//! ```
//!
//! Offset `i` is allocated iff character `i` is `'1'`. Offset 0 (the network
//! address) is never handed out. The file is re-read on every call and
//! rewritten after every change; there is no in-memory cache and no locking.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use ipnetwork::Ipv4Network;
use minibox_common::error::{MiniboxError, Result};

/// Smallest prefix length accepted, bounding the bitmap to 65 536 entries.
pub const MIN_PREFIX: u8 = 16;

const FREE: u8 = b'0';
const USED: &str = "1";

type Bitmaps = BTreeMap<String, String>;

/// Normalises `subnet` to its network address, e.g. `10.0.0.7/24` to `10.0.0.0/24`.
///
/// # Errors
///
/// Returns an error if the prefix is shorter than [`MIN_PREFIX`].
pub fn canonical(subnet: Ipv4Network) -> Result<Ipv4Network> {
    if subnet.prefix() < MIN_PREFIX {
        return Err(MiniboxError::Config {
            message: format!("subnet {subnet} is larger than /{MIN_PREFIX}"),
        });
    }
    Ipv4Network::new(subnet.network(), subnet.prefix()).map_err(|e| MiniboxError::Config {
        message: e.to_string(),
    })
}

fn host_count(subnet: Ipv4Network) -> usize {
    1usize << (32 - u32::from(subnet.prefix()))
}

/// Persistent bitmap allocator backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct Ipam {
    path: PathBuf,
}

impl Ipam {
    /// Creates an allocator persisting to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the state file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Bitmaps> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let bitmaps = serde_json::from_str(&text)?;
                tracing::debug!("$ cat {}", self.path.display());
                Ok(bitmaps)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Bitmaps::new()),
            Err(e) => Err(MiniboxError::io(&self.path, e)),
        }
    }

    fn dump(&self, bitmaps: &Bitmaps) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| MiniboxError::io(dir, e))?;
        }
        let json = serde_json::to_string(bitmaps)?;
        std::fs::write(&self.path, json).map_err(|e| MiniboxError::io(&self.path, e))
    }

    /// Allocates the lowest free host address of `subnet`.
    ///
    /// # Errors
    ///
    /// Returns [`MiniboxError::AddressExhausted`] if every offset but the
    /// network address is taken, or an error if the state file cannot be
    /// read or written.
    pub fn allocate(&self, subnet: Ipv4Network) -> Result<Ipv4Addr> {
        let subnet = canonical(subnet)?;
        let key = subnet.to_string();
        let size = host_count(subnet);

        let mut bitmaps = self.load()?;
        let bitmap = bitmaps
            .entry(key.clone())
            .or_insert_with(|| "0".repeat(size));
        if bitmap.len() != size {
            return Err(MiniboxError::Config {
                message: format!("allocation bitmap of {key} has {} entries, expected {size}", bitmap.len()),
            });
        }

        let offset = bitmap
            .bytes()
            .enumerate()
            .skip(1)
            .find_map(|(i, bit)| (bit == FREE).then_some(i))
            .ok_or(MiniboxError::AddressExhausted { subnet: key.clone() })?;
        let ip = offset_to_ip(subnet, offset).ok_or_else(|| MiniboxError::AddressExhausted {
            subnet: key.clone(),
        })?;
        bitmap.replace_range(offset..=offset, USED);

        self.dump(&bitmaps)?;
        tracing::info!(subnet = %key, %ip, "allocated address");
        Ok(ip)
    }

    /// Returns `ip` to the free pool of `subnet`.
    ///
    /// Releasing an address that is already free, or from a subnet that was
    /// never allocated from, leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if `ip` is outside `subnet` or is its network
    /// address, or if the state file cannot be read or written.
    pub fn release(&self, subnet: Ipv4Network, ip: Ipv4Addr) -> Result<()> {
        let subnet = canonical(subnet)?;
        let key = subnet.to_string();
        let offset = ip_to_offset(subnet, ip).ok_or_else(|| MiniboxError::Config {
            message: format!("{ip} is not a host address of {key}"),
        })?;

        let mut bitmaps = self.load()?;
        let Some(bitmap) = bitmaps.get_mut(&key) else {
            tracing::warn!(subnet = %key, %ip, "release from unknown subnet ignored");
            return Ok(());
        };
        if offset < bitmap.len() {
            bitmap.replace_range(offset..=offset, "0");
        }

        self.dump(&bitmaps)?;
        tracing::info!(subnet = %key, %ip, "released address");
        Ok(())
    }
}

fn offset_to_ip(subnet: Ipv4Network, offset: usize) -> Option<Ipv4Addr> {
    let offset = u32::try_from(offset).ok()?;
    u32::from(subnet.network())
        .checked_add(offset)
        .map(Ipv4Addr::from)
}

fn ip_to_offset(subnet: Ipv4Network, ip: Ipv4Addr) -> Option<usize> {
    if !subnet.contains(ip) {
        return None;
    }
    let offset = u32::from(ip) - u32::from(subnet.network());
    if offset == 0 {
        return None;
    }
    usize::try_from(offset).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn first_allocation_skips_network_address() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("ipam/subnet.json"));
        let first = ipam.allocate(net("192.168.0.0/24")).unwrap();
        let second = ipam.allocate(net("192.168.0.0/24")).unwrap();
        assert_eq!(first, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(second, Ipv4Addr::new(192, 168, 0, 2));
    }

    #[test]
    fn state_is_keyed_by_canonical_cidr() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("subnet.json"));
        let _ = ipam.allocate(net("10.1.2.3/24")).unwrap();

        let text = std::fs::read_to_string(ipam.path()).unwrap();
        let state: Bitmaps = serde_json::from_str(&text).unwrap();
        let bitmap = &state["10.1.2.0/24"];
        assert_eq!(bitmap.len(), 256);
        assert!(bitmap.starts_with("01"));
        assert_eq!(bitmap.matches('1').count(), 1);
    }

    #[test]
    fn release_makes_address_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("subnet.json"));
        let subnet = net("172.18.0.0/29");
        let ips: Vec<_> = (0..3).map(|_| ipam.allocate(subnet).unwrap()).collect();

        ipam.release(subnet, ips[1]).unwrap();
        assert_eq!(ipam.allocate(subnet).unwrap(), ips[1]);
    }

    #[test]
    fn release_rejects_foreign_and_network_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("subnet.json"));
        let subnet = net("10.0.0.0/24");
        assert!(ipam.release(subnet, Ipv4Addr::new(10, 0, 1, 5)).is_err());
        assert!(ipam.release(subnet, Ipv4Addr::new(10, 0, 0, 0)).is_err());
        ipam.release(subnet, Ipv4Addr::new(10, 0, 0, 5)).unwrap();
    }

    #[test]
    fn oversized_subnets_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("subnet.json"));
        assert!(ipam.allocate(net("10.0.0.0/8")).is_err());
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subnet.json");
        std::fs::write(&path, "not json").unwrap();
        let ipam = Ipam::new(path);
        assert!(matches!(
            ipam.allocate(net("10.0.0.0/24")),
            Err(MiniboxError::Serialization { .. })
        ));
    }
}

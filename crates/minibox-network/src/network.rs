//! Persisted network records.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use ipnetwork::Ipv4Network;
use minibox_common::error::{MiniboxError, Result};
use serde::{Deserialize, Serialize};

/// Longest interface name the kernel accepts (`IFNAMSIZ` minus the NUL).
pub const MAX_NAME_LEN: usize = 15;

/// Checks that `name` can serve as both a record file name and a bridge
/// device name.
///
/// # Errors
///
/// Returns [`MiniboxError::Config`] for an empty, `.`, `..`, path-like,
/// whitespace-containing, or over-long name.
pub fn validate_name(name: &str) -> Result<()> {
    let path_like = name.is_empty() || name == "." || name == ".." || name.contains('/');
    if path_like || name.len() > MAX_NAME_LEN || name.contains(char::is_whitespace) {
        return Err(MiniboxError::Config {
            message: format!("invalid network name {name:?}: at most {MAX_NAME_LEN} bytes, no '/' or whitespace"),
        });
    }
    Ok(())
}

/// A named set of containers sharing one bridge and one subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network name; also the name of its bridge device.
    pub name: String,
    /// Gateway address with the subnet prefix, e.g. `192.168.0.1/24`.
    pub ip_range: Ipv4Network,
    /// Name of the driver managing the network.
    pub driver: String,
}

impl Network {
    /// Gateway address assigned to the bridge.
    #[must_use]
    pub fn gateway(&self) -> Ipv4Addr {
        self.ip_range.ip()
    }

    /// The subnet in canonical form, e.g. `192.168.0.0/24`.
    #[must_use]
    pub fn subnet(&self) -> Ipv4Network {
        Ipv4Network::new(self.ip_range.network(), self.ip_range.prefix()).unwrap_or(self.ip_range)
    }

    /// Path of this network's record under `dir`.
    #[must_use]
    pub fn record_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.name))
    }

    /// Writes the record into `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| MiniboxError::io(dir, e))?;
        let path = self.record_path(dir);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| MiniboxError::io(&path, e))?;
        tracing::debug!(network = %self.name, path = %path.display(), "network record written");
        Ok(())
    }

    /// Reads a record file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MiniboxError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Deletes the record from `dir`. A missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self, dir: &Path) -> Result<()> {
        let path = self.record_path(dir);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("$ rm {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MiniboxError::io(path, e)),
        }
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
    fn gateway_and_subnet_come_from_ip_range() {
        let nw = testnet();
        assert_eq!(nw.gateway(), Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(nw.subnet().to_string(), "192.168.0.0/24");
    }

    #[test]
    fn names_must_fit_an_interface() {
        validate_name("testnet").unwrap();
        validate_name("abcdefghijklmno").unwrap();
        for bad in ["", ".", "..", "../etc", "a/b", "two words", "abcdefghijklmnop"] {
            assert!(validate_name(bad).is_err(), "name {bad:?} accepted");
        }
    }

    #[test]
    fn record_survives_dump_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let nw = testnet();
        nw.dump(dir.path()).unwrap();

        let path = dir.path().join("testnet.json");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("192.168.0.1/24"));
        assert_eq!(Network::load(&path).unwrap(), nw);

        nw.remove(dir.path()).unwrap();
        assert!(!path.exists());
        nw.remove(dir.path()).unwrap();
    }
}

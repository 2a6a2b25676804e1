//! Persistent container records.
//!
//! Each container owns the directory `<state>/containers/<name>/`, holding
//! its `config.json` record and, in detached mode, its log file. There is
//! no daemon: every command reads the records it needs from disk.

use std::path::PathBuf;

use minibox_common::config::RuntimeConfig;
use minibox_common::error::{MiniboxError, Result};

use crate::container::ContainerInfo;

/// Reads and writes container records under the state directory.
#[derive(Debug, Clone)]
pub struct ContainerStore {
    config: RuntimeConfig,
}

impl ContainerStore {
    /// Creates a store rooted at the configured state directory.
    #[must_use]
    pub const fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Writes `info`, replacing any previous record of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, info: &ContainerInfo) -> Result<()> {
        let dir = self.config.container_dir(&info.name);
        std::fs::create_dir_all(&dir).map_err(|e| MiniboxError::io(&dir, e))?;

        let path = self.config.container_record(&info.name);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(info)?;
        std::fs::write(&tmp, json).map_err(|e| MiniboxError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| MiniboxError::io(&path, e))?;
        tracing::debug!(name = %info.name, status = %info.status, "container record saved");
        Ok(())
    }

    /// Reads the record of container `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MiniboxError::NotFound`] if there is no such container, or
    /// an error if the record cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<ContainerInfo> {
        let path = self.config.container_record(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MiniboxError::NotFound {
                kind: "container",
                id: name.to_string(),
            }),
            Err(e) => Err(MiniboxError::io(path, e)),
        }
    }

    /// Deletes the container directory, including its log.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.config.container_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!("$ rm -rf {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MiniboxError::io(dir, e)),
        }
    }

    /// Returns every readable record, oldest first.
    ///
    /// Unreadable records are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the containers directory exists but cannot be
    /// listed.
    pub fn list(&self) -> Result<Vec<ContainerInfo>> {
        let dir = self.config.containers_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MiniboxError::io(dir, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MiniboxError::io(&dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.load(&name) {
                Ok(info) => records.push(info),
                Err(e) => tracing::warn!(container = %name, error = %e, "skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    /// Path of the detached log of container `name`.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.config.container_log(name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use minibox_common::types::ContainerStatus;

    use super::*;
    use crate::container::ContainerConfig;

    fn store(dir: &Path) -> ContainerStore {
        ContainerStore::new(RuntimeConfig::new(dir, dir))
    }

    fn record(name: &str) -> ContainerInfo {
        let mut cfg = ContainerConfig::new("busybox", vec!["top".into()]);
        cfg.name = name.into();
        ContainerInfo::running(&cfg, 100)
    }

    #[test]
    fn load_missing_container_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).load("ghost").unwrap_err();
        assert!(matches!(err, MiniboxError::NotFound { kind: "container", .. }));
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut info = record("web");
        store.save(&info).unwrap();

        info.status = ContainerStatus::Stopped;
        info.pid = None;
        store.save(&info).unwrap();
        assert_eq!(store.load("web").unwrap(), info);
        assert!(!dir.path().join("containers/web/config.json.tmp").exists());
    }

    #[test]
    fn list_skips_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&record("a")).unwrap();
        store.save(&record("b")).unwrap();
        std::fs::create_dir_all(dir.path().join("containers/broken")).unwrap();
        std::fs::write(dir.path().join("containers/broken/config.json"), "{").unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
    }

    #[test]
    fn list_without_state_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(&dir.path().join("none")).list().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_log_with_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&record("web")).unwrap();
        std::fs::write(store.log_path("web"), "hello").unwrap();

        store.delete("web").unwrap();
        assert!(!dir.path().join("containers/web").exists());
        store.delete("web").unwrap();
    }
}

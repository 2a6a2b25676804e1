//! Container launch configuration and the persisted container record.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::{ContainerId, ContainerStatus, ResourceConfig, VolumeSpec};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

/// Everything needed to launch one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Inherit the caller's terminal and wait for the container to exit.
    pub tty: bool,
    /// Container name; the record and workspace are keyed by it.
    pub name: String,
    /// Generated identifier.
    pub id: ContainerId,
    /// Optional `hostPath:containerPath` binding.
    pub volume: Option<VolumeSpec>,
    /// Image name, resolved to `<images>/<image>.tar`.
    pub image: String,
    /// Extra `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// Command and arguments run inside the container.
    pub command: Vec<String>,
    /// cgroup limits.
    pub resources: ResourceConfig,
    /// Network to attach to.
    pub network: Option<String>,
    /// `hostPort:containerPort` entries.
    pub port_mapping: Vec<String>,
}

impl ContainerConfig {
    /// Creates a configuration with a fresh id; the name defaults to the id.
    #[must_use]
    pub fn new(image: impl Into<String>, command: Vec<String>) -> Self {
        let id = ContainerId::generate();
        Self {
            tty: false,
            name: id.to_string(),
            id,
            volume: None,
            image: image.into(),
            env: Vec::new(),
            command,
            resources: ResourceConfig::default(),
            network: None,
            port_mapping: Vec::new(),
        }
    }

    /// Checks the configuration before anything is created on the host.
    ///
    /// # Errors
    ///
    /// Returns [`MiniboxError::Config`] for an empty command, an image or
    /// name that is not a single path component, or an env entry without
    /// `=`.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(MiniboxError::Config { message });
        if self.command.is_empty() {
            return invalid("container command is empty".into());
        }
        if !is_path_component(&self.image) {
            return invalid(format!("invalid image name {:?}", self.image));
        }
        if !is_path_component(&self.name) || self.name.starts_with('.') {
            return invalid(format!("invalid container name {:?}", self.name));
        }
        if let Some(bad) = self.env.iter().find(|e| !e.contains('=')) {
            return invalid(format!("environment entry {bad:?} is not KEY=VALUE"));
        }
        Ok(())
    }

    /// Name of the container's cgroup in every hierarchy.
    #[must_use]
    pub fn cgroup_name(&self) -> String {
        cgroup_name(&self.id)
    }
}

/// A non-empty name that stays inside the directory it is joined to.
fn is_path_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// cgroup name for container `id`.
#[must_use]
pub fn cgroup_name(id: &ContainerId) -> String {
    format!("{}-{id}", minibox_common::constants::CGROUP_PREFIX)
}

/// Persisted record of a container, one JSON file per container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container identifier.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Host pid of the init process while it runs.
    pub pid: Option<i32>,
    /// Space-joined command line.
    pub command: String,
    /// Image the container was started from.
    pub image: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: ContainerStatus,
    /// Volume binding, if any.
    pub volume: Option<VolumeSpec>,
    /// Forwarded ports.
    pub port_mapping: Vec<String>,
    /// Attached network, if any.
    pub network: Option<String>,
    /// Address on the attached network.
    pub ip: Option<Ipv4Addr>,
}

impl ContainerInfo {
    /// A `running` record for a freshly launched container.
    #[must_use]
    pub fn running(config: &ContainerConfig, pid: i32) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            pid: Some(pid),
            command: config.command.join(" "),
            image: config.image.clone(),
            created_at: Utc::now(),
            status: ContainerStatus::Running,
            volume: config.volume.clone(),
            port_mapping: config.port_mapping.clone(),
            network: None,
            ip: None,
        }
    }

    /// Returns `true` if the recorded pid still refers to a live process.
    ///
    /// A zombie waiting to be reaped counts as dead.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.pid.is_some_and(pid_alive)
    }
}

/// Returns `true` if `pid` exists and is not a zombie.
#[must_use]
pub fn pid_alive(pid: i32) -> bool {
    pid > 0 && kill(Pid::from_raw(pid), None).is_ok() && process_state(pid) != Some('Z')
}

/// Scheduler state letter of `pid` from `/proc/<pid>/stat`.
fn process_state(pid: i32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // The command field may itself contain ')'.
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_defaults_to_generated_id() {
        let cfg = ContainerConfig::new("busybox", vec!["sh".into()]);
        assert_eq!(cfg.name, cfg.id.as_str());
        assert!(cfg.cgroup_name().starts_with("minibox-"));
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_input() {
        let mut cfg = ContainerConfig::new("busybox", Vec::new());
        assert!(cfg.validate().is_err());

        cfg.command = vec!["top".into()];
        cfg.name = "../escape".into();
        assert!(cfg.validate().is_err());

        cfg.name = "web".into();
        cfg.env = vec!["NOEQUALS".into()];
        assert!(cfg.validate().is_err());

        cfg.env = vec!["A=1".into()];
        cfg.validate().unwrap();
    }

    #[test]
    fn image_must_stay_inside_layer_dir() {
        let mut cfg = ContainerConfig::new("busybox", vec!["top".into()]);
        for image in ["", ".", "..", "../busybox", "a/b"] {
            cfg.image = image.into();
            assert!(cfg.validate().is_err(), "image {image:?} accepted");
        }
        cfg.image = "busybox.v2".into();
        cfg.validate().unwrap();
    }

    #[test]
    fn running_record_joins_command() {
        let mut cfg = ContainerConfig::new("busybox", vec!["sleep".into(), "10".into()]);
        cfg.port_mapping = vec!["8080:80".into()];
        let info = ContainerInfo::running(&cfg, 4321);
        assert_eq!(info.command, "sleep 10");
        assert_eq!(info.status, ContainerStatus::Running);
        assert_eq!(info.pid, Some(4321));
        assert_eq!(info.port_mapping, vec!["8080:80"]);
    }

    #[test]
    fn missing_pid_is_not_alive() {
        let cfg = ContainerConfig::new("busybox", vec!["sh".into()]);
        let mut info = ContainerInfo::running(&cfg, i32::MAX);
        assert!(!info.is_alive());
        info.pid = Some(i32::try_from(std::process::id()).unwrap());
        assert!(info.is_alive());
    }

    #[test]
    fn unreaped_child_is_not_alive() {
        let mut child = std::process::Command::new("sh").args(["-c", "exit 0"]).spawn().unwrap();
        let pid = i32::try_from(child.id()).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while process_state(pid) != Some('Z') && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(!pid_alive(pid));
        let _ = child.wait().unwrap();
    }
}

//! Runtime engine that orchestrates the container lifecycle.
//!
//! `run` is one linear protocol: launch the init (blocked on its pipe),
//! record it, attach the cgroup, connect the network, then release the
//! command. Everything created before a failure is torn down again.

use std::time::{Duration, Instant};

use minibox_common::config::RuntimeConfig;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ContainerStatus;
use minibox_core::cgroup::{CgroupManager, MountInfo};
use minibox_core::filesystem::overlayfs::{OverlayFs, UnionFs};
use minibox_core::filesystem::workspace::{Workspace, WorkspaceLayout};
use minibox_network::driver::NetworkDriver;
use minibox_network::store::default_drivers;
use minibox_network::{ConnectRequest, NetworkStore};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::container::{ContainerConfig, ContainerInfo, cgroup_name, pid_alive};
use crate::process::{InitProcess, launch};
use crate::state::ContainerStore;

/// How long `stop` waits after `SIGTERM` before sending `SIGKILL`.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `stop` waits for a `SIGKILL`ed init to disappear.
const KILL_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Builds the network drivers available to one network operation.
pub type DriverSet = fn() -> Vec<Box<dyn NetworkDriver>>;

/// How a `run` finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The container keeps running in the background.
    Detached(ContainerInfo),
    /// The attached container exited and was cleaned up.
    Exited {
        /// Container name.
        name: String,
        /// Exit code of the container's init.
        code: i32,
    },
}

/// The runtime engine that coordinates all container operations.
///
/// The union filesystem, the cgroup mount table, and the network drivers
/// default to the host's and can be replaced.
#[derive(Debug)]
pub struct Engine<F: UnionFs = OverlayFs> {
    config: RuntimeConfig,
    workspace: Workspace<F>,
    records: ContainerStore,
    cgroup_mounts: Option<MountInfo>,
    drivers: DriverSet,
    stop_timeout: Duration,
}

impl Engine {
    /// Creates an engine rooted at the directories of `config`.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let workspace = Workspace::new(WorkspaceLayout::from_config(&config));
        Self::with_workspace(config, workspace)
    }
}

impl<F: UnionFs> Engine<F> {
    /// Creates an engine building container roots with `workspace`.
    #[must_use]
    pub fn with_workspace(config: RuntimeConfig, workspace: Workspace<F>) -> Self {
        Self {
            workspace,
            records: ContainerStore::new(config.clone()),
            config,
            cgroup_mounts: None,
            drivers: default_drivers,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    /// Resolves cgroup controllers against `mounts` instead of
    /// `/proc/self/mountinfo`.
    #[must_use]
    pub fn with_cgroup_mounts(mut self, mounts: MountInfo) -> Self {
        self.cgroup_mounts = Some(mounts);
        self
    }

    /// Registers the drivers built by `drivers` for network operations.
    #[must_use]
    pub fn with_network_drivers(mut self, drivers: DriverSet) -> Self {
        self.drivers = drivers;
        self
    }

    /// Sets how long `stop` waits for `SIGTERM` to take effect.
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Returns the container record store.
    #[must_use]
    pub const fn records(&self) -> &ContainerStore {
        &self.records
    }

    /// Starts a container.
    ///
    /// With a terminal the call blocks until the container exits and then
    /// removes everything it created. Otherwise it returns as soon as the
    /// command has been released.
    ///
    /// A network that cannot be connected is logged; the container still
    /// runs, without networking.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the name is taken,
    /// or the container cannot be launched, recorded, or attached to its
    /// cgroup.
    pub fn run(&self, config: &ContainerConfig) -> Result<RunOutcome> {
        config.validate()?;
        if self.records.load(&config.name).is_ok() {
            return Err(MiniboxError::Config {
                message: format!("container name {:?} is already in use", config.name),
            });
        }

        let log_path = self.records.log_path(&config.name);
        let mut init = launch(&self.workspace, config, &log_path)?;
        let info = self.attach(&mut init, config)?;

        if !config.tty {
            tracing::info!(name = %info.name, pid = %init.pid, root = %init.root.display(), "container detached");
            return Ok(RunOutcome::Detached(info));
        }

        let code = init.wait();
        tracing::info!(name = %info.name, code = ?code, "container exited");
        self.teardown(&info)?;
        Ok(RunOutcome::Exited {
            name: info.name,
            code: code?,
        })
    }

    /// Records a launched init, attaches its cgroup and network, and then
    /// releases its command.
    ///
    /// On failure the init is killed and its record, cgroup, network
    /// endpoint, and root are removed again.
    fn attach(&self, init: &mut InitProcess, config: &ContainerConfig) -> Result<ContainerInfo> {
        let mut info = ContainerInfo::running(config, init.pid.as_raw());
        if let Err(e) = self.start(init, config, &mut info) {
            tracing::error!(name = %config.name, error = %e, "container start failed, rolling back");
            init.kill();
            if let Err(cleanup) = self.teardown(&info) {
                tracing::warn!(name = %info.name, error = %cleanup, "rollback incomplete");
            }
            return Err(e);
        }
        Ok(info)
    }

    fn start(&self, init: &mut InitProcess, config: &ContainerConfig, info: &mut ContainerInfo) -> Result<()> {
        self.records.save(info)?;

        let cgroup = self.cgroup(config.cgroup_name())?;
        if !config.resources.is_empty() {
            cgroup.set(&config.resources)?;
        }
        cgroup.apply(init.pid.as_raw())?;

        if let Some(network) = &config.network {
            self.connect(network, config, info);
            self.records.save(info)?;
        }

        init.send_command(&config.command)
    }

    fn connect(&self, network: &str, config: &ContainerConfig, info: &mut ContainerInfo) {
        let Some(pid) = info.pid else {
            return;
        };
        let request = ConnectRequest {
            container_id: config.id.as_str(),
            pid,
            port_mapping: &config.port_mapping,
        };
        match self.networks().and_then(|store| store.connect(network, &request)) {
            Ok(endpoint) => {
                info.network = Some(network.to_string());
                info.ip = Some(endpoint.ip_address);
            }
            Err(e) => {
                tracing::error!(name = %info.name, %network, error = %e, "network connect failed, container runs without network");
            }
        }
    }

    /// Stops a running container and marks it stopped.
    ///
    /// Sends `SIGTERM`, then `SIGKILL` if the init is still alive after the
    /// stop timeout. The init of a PID namespace ignores `SIGTERM` unless it
    /// installed a handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist, is not running,
    /// cannot be signalled, or outlives `SIGKILL`; the record is left
    /// untouched in those cases.
    pub fn stop(&self, name: &str) -> Result<ContainerInfo> {
        let mut info = self.records.load(name)?;
        let Some(pid) = info.pid.filter(|_| info.status == ContainerStatus::Running) else {
            return Err(MiniboxError::Config {
                message: format!("container {name:?} is not running"),
            });
        };

        signal(pid, Signal::SIGTERM)?;
        if !wait_exit(pid, self.stop_timeout) {
            tracing::warn!(name, pid, timeout = ?self.stop_timeout, "container ignored SIGTERM, killing");
            signal(pid, Signal::SIGKILL)?;
            if !wait_exit(pid, KILL_TIMEOUT) {
                return Err(MiniboxError::Config {
                    message: format!("container {name:?} (pid {pid}) did not exit after SIGKILL"),
                });
            }
        }

        info.status = ContainerStatus::Stopped;
        info.pid = None;
        self.records.save(&info)?;
        tracing::info!(name, pid, "container stopped");
        Ok(info)
    }

    /// Removes a container whose init is no longer alive.
    ///
    /// Disconnects its network, deletes its root filesystem and cgroup, and
    /// deletes its record and log.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist, its init is still
    /// alive, or its record cannot be deleted.
    pub fn remove(&self, name: &str) -> Result<()> {
        let info = self.records.load(name)?;
        if info.is_alive() {
            return Err(MiniboxError::Config {
                message: format!("container {name:?} is running, stop it first"),
            });
        }
        self.teardown(&info)?;
        tracing::info!(name, "container removed");
        Ok(())
    }

    /// Returns every container, marking those whose init has died as
    /// exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be listed.
    pub fn list(&self) -> Result<Vec<ContainerInfo>> {
        let mut records = self.records.list()?;
        for info in records
            .iter_mut()
            .filter(|info| info.status == ContainerStatus::Running && !info.is_alive())
        {
            info.status = ContainerStatus::Exited;
            info.pid = None;
            if let Err(e) = self.records.save(info) {
                tracing::warn!(name = %info.name, error = %e, "failed to update stale record");
            }
        }
        Ok(records)
    }

    /// Returns the detached log of a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist or its log cannot
    /// be read.
    pub fn logs(&self, name: &str) -> Result<String> {
        let info = self.records.load(name)?;
        crate::logs::read_logs(&self.records.log_path(&info.name))
    }

    /// Runs `command` inside a running container and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist or is not running,
    /// or the command cannot be started.
    pub fn exec(&self, name: &str, command: &[String]) -> Result<i32> {
        let info = self.records.load(name)?;
        match info.pid {
            Some(pid) if info.is_alive() => crate::exec::exec_container(pid, command),
            _ => Err(MiniboxError::Config {
                message: format!("container {name:?} is not running"),
            }),
        }
    }

    fn cgroup(&self, name: String) -> Result<CgroupManager> {
        match &self.cgroup_mounts {
            Some(mounts) => Ok(CgroupManager::with_mounts(name, mounts.clone())),
            None => CgroupManager::new(name),
        }
    }

    fn networks(&self) -> Result<NetworkStore> {
        NetworkStore::load_with_drivers(&self.config, (self.drivers)())
    }

    fn teardown(&self, info: &ContainerInfo) -> Result<()> {
        if let (Some(network), Some(ip)) = (&info.network, info.ip) {
            let disconnected = self.networks().and_then(|store| {
                store.disconnect(network, info.id.as_str(), ip, &info.port_mapping)
            });
            if let Err(e) = disconnected {
                tracing::warn!(name = %info.name, %network, error = %e, "network disconnect failed");
            }
        }

        self.workspace.delete(&info.name, info.volume.as_ref());

        match self.cgroup(cgroup_name(&info.id)) {
            Ok(cgroup) => cgroup.destroy(),
            Err(e) => tracing::warn!(name = %info.name, error = %e, "cgroup lookup failed"),
        }

        self.records.delete(&info.name)
    }
}

/// Sends `sig` to `pid`; a process that is already gone is not an error.
fn signal(pid: i32, sig: Signal) -> Result<()> {
    match kill(Pid::from_raw(pid), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(MiniboxError::syscall("kill", format!("/proc/{pid}"), e)),
    }
}

/// Polls until `pid` is gone or `timeout` passes. Returns `true` if it exited.
fn wait_exit(pid: i32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while pid_alive(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    true
}

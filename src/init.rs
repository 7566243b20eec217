//! Init system core - PID 1 duties and boot sequencing.

use crate::config::InitConfig;
use crate::error::{Error, Result};
use crate::mount::{self, Filesystem, HostFilesystem, MountReport};
use crate::reaper::Reaper;
use crate::services::{self, LaunchedService};
use crate::session::{ForegroundSession, SessionEnd};
use crate::shutdown::{HostPower, Power, ShutdownController, ShutdownRequest, ShutdownSignal};
use std::fmt;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// States of the boot sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    Mounting,
    LaunchingServices,
    ShellRunning,
    AwaitingSignal,
    Rebooting,
}

impl BootPhase {
    pub(crate) fn enter(self) {
        info!(phase = %self, "Entering boot phase");
    }
}

impl fmt::Display for BootPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootPhase::Mounting => write!(f, "mounting"),
            BootPhase::LaunchingServices => write!(f, "launching-services"),
            BootPhase::ShellRunning => write!(f, "shell-running"),
            BootPhase::AwaitingSignal => write!(f, "awaiting-signal"),
            BootPhase::Rebooting => write!(f, "rebooting"),
        }
    }
}

/// What the background part of boot produced.
#[derive(Debug)]
pub struct BootReport {
    /// One entry per attempted mount; empty when mounting is disabled
    pub mounts: Vec<MountReport>,
    /// Launched services, or the error listing the services directory
    pub services: Result<Vec<LaunchedService>>,
    /// The reaper task, running until the process ends
    pub reaper: JoinHandle<()>,
}

/// The init process.
pub struct Init<F = HostFilesystem, P = HostPower> {
    config: InitConfig,
    fs: F,
    power: P,
}

impl Init {
    /// Create an init process talking to the real kernel.
    pub fn new(config: InitConfig) -> Result<Self> {
        let pid = std::process::id();
        if config.require_pid1 && pid != 1 {
            return Err(Error::NotPid1(pid));
        }

        let power = HostPower::for_pid(pid);
        Ok(Self::with_system(config, HostFilesystem, power))
    }
}

impl<F: Filesystem, P: Power> Init<F, P> {
    /// Create an init process with the given kernel interfaces.
    pub fn with_system(config: InitConfig, fs: F, power: P) -> Self {
        Self { config, fs, power }
    }

    pub fn config(&self) -> &InitConfig {
        &self.config
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    /// Mount, then start the reaper and every service.
    ///
    /// Returns as soon as everything is started. Must be called within the
    /// runtime.
    pub fn boot(&self) -> BootReport {
        BootPhase::Mounting.enter();
        let mounts = if self.config.mount_filesystems {
            mount::prepare(&self.fs, &self.config.mounts)
        } else {
            info!("Skipping virtual filesystem mounts");
            Vec::new()
        };

        BootPhase::LaunchingServices.enter();
        let reaper = Reaper::new(self.config.reap_interval()).spawn();

        let services = services::launch(&self.config.services_dir, &self.config.log_dir);
        if let Err(e) = &services {
            error!(error = %e, "Failed to start services");
        }

        BootReport {
            mounts,
            services,
            reaper,
        }
    }

    /// Run the whole boot sequence through to the reboot.
    ///
    /// Only returns if the reboot did not happen: the power controller
    /// declined or failed, or the shutdown channel closed.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<ShutdownRequest> {
        info!(pid = std::process::id(), "microinit starting");

        // Services and the reaper are detached from here on.
        let _ = self.boot();

        BootPhase::ShellRunning.enter();
        let session = ForegroundSession::new(self.config.shell.clone(), self.config.prompt.clone());
        if let SessionEnd::SpawnFailed(e) = session.run().await {
            error!(error = %e, "No foreground shell available");
        }

        ShutdownController::new(self.power).run(shutdown).await
    }
}

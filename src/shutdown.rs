//! Termination signal plumbing and the reboot that follows it.
//!
//! PID 1 gets no default disposition for SIGTERM or SIGINT, and exiting
//! PID 1 panics the kernel, so both are intercepted at startup and turned
//! into a single pending [`ShutdownRequest`]. The controller consumes the
//! first request and reboots; anything sent after that is dropped.

use crate::error::{Error, Result};
use crate::init::BootPhase;
use async_trait::async_trait;
use nix::sys::reboot::{reboot, RebootMode};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

/// Why shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// SIGTERM
    Terminate,
    /// SIGINT
    Interrupt,
}

/// Sending half of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownRequest>,
}

impl ShutdownTrigger {
    /// Queue a shutdown request. Returns false if one is already pending or
    /// the request has been consumed.
    pub fn notify(&self, request: ShutdownRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(request = ?request, "Shutdown already pending, dropping request");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(request = ?request, "Shutdown already under way, dropping request");
                false
            }
        }
    }
}

/// Receiving half: holds at most one pending request.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: mpsc::Receiver<ShutdownRequest>,
}

impl ShutdownSignal {
    /// A single-slot channel not connected to any OS signal.
    pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
        let (tx, rx) = mpsc::channel(1);
        (ShutdownTrigger { tx }, ShutdownSignal { rx })
    }

    /// Intercept SIGTERM and SIGINT for the rest of the process lifetime.
    ///
    /// Must be called from within the runtime, before anything that could
    /// receive either signal is started.
    pub fn install() -> Result<Self> {
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| Error::Signal(format!("Failed to install SIGTERM handler: {}", e)))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| Error::Signal(format!("Failed to install SIGINT handler: {}", e)))?;

        let (trigger, shutdown) = Self::channel();

        tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    Some(()) = sigterm.recv() => ShutdownRequest::Terminate,
                    Some(()) = sigint.recv() => ShutdownRequest::Interrupt,
                    else => break,
                };
                info!(request = ?request, "Received shutdown signal");
                trigger.notify(request);
            }
        });

        Ok(shutdown)
    }

    /// Wait for the first request. Consumes the signal so it can only be
    /// acted on once.
    pub async fn wait(mut self) -> Result<ShutdownRequest> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| Error::Signal("Shutdown channel closed".to_string()))
    }
}

/// Machine power control.
#[async_trait]
pub trait Power: Send + Sync {
    /// Restart the machine. Only returns on failure, or when the
    /// implementation is not allowed to reboot.
    async fn reboot(&self) -> Result<()>;
}

/// Reboots the running kernel.
#[derive(Debug, Clone, Copy)]
pub struct HostPower {
    enabled: bool,
}

impl HostPower {
    /// `enabled` is false when not running as PID 1; the reboot is then
    /// only logged.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Reboot only when `pid` is 1, whatever the configuration says.
    pub fn for_pid(pid: u32) -> Self {
        Self::new(pid == 1)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl Power for HostPower {
    async fn reboot(&self) -> Result<()> {
        if !self.enabled {
            info!("Not PID 1, skipping reboot");
            return Ok(());
        }

        tokio::task::spawn_blocking(|| -> Result<()> {
            // Flush service logs before the restart.
            unsafe {
                libc::sync();
            }
            reboot(RebootMode::RB_AUTOBOOT)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Reboot(e.to_string()))?
    }
}

/// Waits for the shutdown request and reboots.
pub struct ShutdownController<P> {
    power: P,
}

impl<P: Power> ShutdownController<P> {
    pub fn new(power: P) -> Self {
        Self { power }
    }

    /// Block until the first shutdown request, then reboot.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<ShutdownRequest> {
        BootPhase::AwaitingSignal.enter();
        let request = shutdown.wait().await?;

        BootPhase::Rebooting.enter();
        info!(request = ?request, "Rebooting");
        self.power.reboot().await?;

        Ok(request)
    }
}

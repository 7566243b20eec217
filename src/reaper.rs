//! Zombie reaping for PID 1 duty.
//!
//! Every process whose parent exits is re-parented to PID 1, and nobody else
//! can collect its exit status. The reaper drains all exited children with
//! non-blocking waits, then idles for a short interval, forever.
//!
//! The reaper does not coordinate with service supervisors. Whichever caller
//! reaches `waitpid` first observes a given exit; the other sees `ECHILD`.

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A child whose exit status was collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedChild {
    /// Process ID
    pub pid: i32,
    /// Exit code (if exited normally)
    pub code: Option<i32>,
    /// Signal (if killed by signal)
    pub signal: Option<i32>,
}

/// Collect every child that has already exited, without blocking.
///
/// Stops when the kernel reports no child is ready or there are no children
/// at all. Interrupted waits are retried.
pub fn drain() -> Vec<ReapedChild> {
    let mut reaped = Vec::new();

    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                debug!(pid = pid.as_raw(), code = code, "Reaped zombie process");
                reaped.push(ReapedChild {
                    pid: pid.as_raw(),
                    code: Some(code),
                    signal: None,
                });
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                debug!(pid = pid.as_raw(), signal = ?sig, "Reaped signaled process");
                reaped.push(ReapedChild {
                    pid: pid.as_raw(),
                    code: None,
                    signal: Some(sig as i32),
                });
            }
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!(error = %e, "Error reaping zombies");
                break;
            }
        }
    }

    reaped
}

/// Background zombie collector.
#[derive(Debug, Clone)]
pub struct Reaper {
    interval: Duration,
}

impl Reaper {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Drain, sleep, repeat. Never returns.
    pub async fn run(self) {
        debug!(interval_ms = self.interval.as_millis() as u64, "Reaper running");
        loop {
            let reaped = drain();
            if !reaped.is_empty() {
                debug!(count = reaped.len(), "Reaper pass finished");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Run the reaper as its own task for the lifetime of the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

impl Default for Reaper {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

//! microinit - a minimal PID 1 for ephemeral virtual machines.
//!
//! The kernel starts this process first. It:
//!
//! - Mounts the pseudo-filesystems everything else expects
//!   (`/dev`, `/proc`, `/sys`, `/tmp`, `/run`)
//! - Reaps every orphaned child, forever
//! - Starts each executable in the services directory once, logging its
//!   output to `<log_dir>/<name>.log`
//! - Runs an interactive shell on the console
//! - Reboots the machine on the first SIGTERM or SIGINT after the shell exits
//!
//! There is deliberately no dependency ordering, restart policy, or unit
//! file parsing.
//!
//! # Example
//!
//! ```no_run
//! use microinit::{Init, InitConfig, ShutdownSignal};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let shutdown = ShutdownSignal::install()?;
//!     let init = Init::new(InitConfig::default())?;
//!     init.run(shutdown).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod init;
pub mod mount;
pub mod reaper;
pub mod services;
pub mod session;
pub mod shutdown;

// Re-export main types
pub use config::{InitConfig, MountSpec, ShellCommand};
pub use error::{Error, Result};
pub use init::{BootPhase, BootReport, Init};
pub use mount::{Filesystem, HostFilesystem, MountReport};
pub use reaper::{ReapedChild, Reaper};
pub use services::{LaunchedService, ServiceEntry, ServiceOutcome};
pub use session::{ForegroundSession, SessionEnd};
pub use shutdown::{
    HostPower, Power, ShutdownController, ShutdownRequest, ShutdownSignal, ShutdownTrigger,
};

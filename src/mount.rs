//! Pseudo-filesystem preparation.
//!
//! Runs before anything else at boot. Every mount in the list is attempted
//! exactly once, in order. Failures are logged and reported back but never
//! stop the boot sequence: the kernel may already provide the mount, or
//! nothing later may need it.

use crate::config::MountSpec;
use crate::error::{Error, Result};
use nix::mount::{mount, MsFlags};
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use tracing::{info, warn};

/// Source device name passed to mount(2) for pseudo-filesystems.
pub const MOUNT_SOURCE: &str = "none";

/// Kernel operations needed to prepare mounts.
pub trait Filesystem: Send + Sync {
    /// Create a directory and its parents if missing.
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Mount a pseudo-filesystem.
    fn mount(&self, spec: &MountSpec) -> Result<()>;
}

/// The running kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFilesystem;

impl Filesystem for HostFilesystem {
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        DirBuilder::new().recursive(true).mode(0o755).create(path)
    }

    fn mount(&self, spec: &MountSpec) -> Result<()> {
        mount(
            Some(MOUNT_SOURCE),
            spec.target.as_path(),
            Some(spec.fstype.as_str()),
            MsFlags::empty(),
            None::<&str>,
        )
        .map_err(|e| Error::Mount {
            target: spec.target.clone(),
            fstype: spec.fstype.clone(),
            reason: e.to_string(),
        })
    }
}

/// Outcome of one mount attempt.
#[derive(Debug)]
pub struct MountReport {
    pub spec: MountSpec,
    pub result: Result<()>,
}

impl MountReport {
    pub fn is_mounted(&self) -> bool {
        self.result.is_ok()
    }
}

/// Mount every filesystem in `mounts`, in order.
///
/// Returns one report per entry. The caller is free to ignore them; each
/// failure has already been logged.
pub fn prepare<F: Filesystem + ?Sized>(fs: &F, mounts: &[MountSpec]) -> Vec<MountReport> {
    info!(count = mounts.len(), "Mounting virtual filesystems");

    mounts
        .iter()
        .map(|spec| {
            if let Err(e) = fs.create_dir_all(&spec.target) {
                warn!(target = %spec.target.display(), error = %e, "Failed to create mount point");
            }

            let result = fs.mount(spec);
            match &result {
                Ok(()) => info!(
                    source = MOUNT_SOURCE,
                    target = %spec.target.display(),
                    fstype = %spec.fstype,
                    "Mounted filesystem"
                ),
                Err(e) => warn!(error = %e, "Failed to mount {}", spec.target.display()),
            }

            MountReport {
                spec: spec.clone(),
                result,
            }
        })
        .collect()
}

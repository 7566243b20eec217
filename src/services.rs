//! Service discovery and launch.
//!
//! Every executable in the services directory is started once at boot with
//! its stdout and stderr appended to `<log_dir>/<name>.log`. Launching is
//! fire-and-forget: each service gets a task that holds the log file and
//! waits on the child, and nobody waits on those tasks.

use crate::error::{Error, Result};
use std::fs::{DirBuilder, File, Metadata, OpenOptions};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// An executable found in the services directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// File name, also used to name the log file
    pub name: String,
    /// Path as listed, symlinks not resolved
    pub path: PathBuf,
}

impl ServiceEntry {
    /// Log file for this service inside `log_dir`.
    pub fn log_path(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("{}.log", self.name))
    }
}

/// How a supervised service ended.
#[derive(Debug)]
pub enum ServiceOutcome {
    /// The supervising task collected the exit status
    Exited(ExitStatus),
    /// Another waiter (the reaper) collected it first
    ClaimedElsewhere,
}

/// A service whose supervising task has been spawned.
#[derive(Debug)]
pub struct LaunchedService {
    pub entry: ServiceEntry,
    pub handle: JoinHandle<Result<ServiceOutcome>>,
}

/// A running service child and the log file it writes to.
#[derive(Debug)]
pub struct ServiceProcess {
    entry: ServiceEntry,
    _log: File,
    child: Child,
}

impl ServiceProcess {
    /// Open the log file and start the binary with both output streams
    /// pointed at it.
    pub fn start(entry: &ServiceEntry, log_path: &Path) -> Result<Self> {
        let log = open_log(log_path).map_err(|e| Error::ServiceStart {
            name: entry.name.clone(),
            reason: format!("Failed to open {}: {}", log_path.display(), e),
        })?;

        let child = Command::new(&entry.path)
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log.try_clone()?)
            .spawn()
            .map_err(|e| Error::ServiceStart {
                name: entry.name.clone(),
                reason: format!("{}: {}", entry.path.display(), e),
            })?;

        Ok(Self {
            entry: entry.clone(),
            _log: log,
            child,
        })
    }

    /// OS process ID, while the child has not been waited on.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Block until the child exits.
    pub async fn wait(mut self) -> Result<ServiceOutcome> {
        match self.child.wait().await {
            Ok(status) => Ok(ServiceOutcome::Exited(status)),
            Err(e) if e.raw_os_error() == Some(libc::ECHILD) => {
                Ok(ServiceOutcome::ClaimedElsewhere)
            }
            Err(e) => Err(Error::ServiceStart {
                name: self.entry.name.clone(),
                reason: format!("wait failed: {}", e),
            }),
        }
    }
}

/// Open a service log for appending, creating it with mode 0644.
pub fn open_log(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(path)
}

fn is_executable(meta: &Metadata) -> bool {
    meta.permissions().mode() & 0o111 != 0
}

/// List the services to launch.
///
/// Directories are skipped, symlinks are followed, and only entries with
/// at least one execute bit are kept. The result is sorted by name.
pub fn discover(services_dir: &Path) -> Result<Vec<ServiceEntry>> {
    let entries = std::fs::read_dir(services_dir).map_err(|source| Error::ServicesDir {
        path: services_dir.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }

        let path = entry.path();
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Service entry vanished");
                continue;
            }
        };

        if meta.is_dir() || !is_executable(&meta) {
            debug!(path = %path.display(), "Skipping non-executable entry");
            continue;
        }

        found.push(ServiceEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
        });
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Start every service in `services_dir` without waiting for any of them.
///
/// Only a failure to list the directory is returned. Per-service failures
/// are logged by the supervising task and end up in its join handle.
pub fn launch(services_dir: &Path, log_dir: &Path) -> Result<Vec<LaunchedService>> {
    let entries = discover(services_dir)?;

    if let Err(e) = DirBuilder::new().recursive(true).mode(0o755).create(log_dir) {
        warn!(path = %log_dir.display(), error = %e, "Failed to create log directory");
    }

    info!(count = entries.len(), dir = %services_dir.display(), "Launching services");

    Ok(entries
        .into_iter()
        .map(|entry| {
            let log_path = entry.log_path(log_dir);
            info!(service = %entry.name, log = %log_path.display(), "Launching service");
            let handle = tokio::spawn(supervise(entry.clone(), log_path));
            LaunchedService { entry, handle }
        })
        .collect())
}

async fn supervise(entry: ServiceEntry, log_path: PathBuf) -> Result<ServiceOutcome> {
    let result = run_to_exit(&entry, &log_path).await;

    match &result {
        Ok(ServiceOutcome::Exited(status)) => {
            debug!(service = %entry.name, status = %status, "Service exited")
        }
        Ok(ServiceOutcome::ClaimedElsewhere) => {
            debug!(service = %entry.name, "Service exited, status collected by reaper")
        }
        Err(e) => warn!(service = %entry.name, error = %e, "Service failed"),
    }

    result
}

async fn run_to_exit(entry: &ServiceEntry, log_path: &Path) -> Result<ServiceOutcome> {
    let process = ServiceProcess::start(entry, log_path)?;
    debug!(service = %entry.name, pid = ?process.pid(), "Spawned service");
    process.wait().await
}

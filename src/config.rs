//! Init configuration.
//!
//! Everything the boot sequence needs is carried in [`InitConfig`], built
//! once in `main` and handed to [`crate::Init`]. Values come from compiled
//! defaults, optionally overridden by a TOML file and then by command-line
//! flags.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/microinit.toml";

/// Shortest idle time allowed between reaper passes.
pub const MIN_REAP_INTERVAL_MS: u64 = 10;

/// A pseudo-filesystem to mount at boot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MountSpec {
    /// Mount point, created if missing
    pub target: PathBuf,
    /// Filesystem type passed to mount(2)
    pub fstype: String,
}

impl MountSpec {
    pub fn new(target: impl Into<PathBuf>, fstype: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            fstype: fstype.into(),
        }
    }
}

/// The fixed mount list, in the order it is applied.
pub fn default_mounts() -> Vec<MountSpec> {
    vec![
        MountSpec::new("/dev", "devtmpfs"),
        MountSpec::new("/proc", "proc"),
        MountSpec::new("/sys", "sysfs"),
        MountSpec::new("/tmp", "tmpfs"),
        MountSpec::new("/run", "tmpfs"),
    ]
}

/// The interactive command run in the foreground.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShellCommand {
    /// Program to execute
    pub program: PathBuf,
    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/bin/busybox"),
            args: vec!["sh".to_string()],
        }
    }
}

/// Init system configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Directory scanned for service executables
    pub services_dir: PathBuf,
    /// Directory receiving one `<name>.log` per service
    pub log_dir: PathBuf,
    /// Pseudo-filesystems mounted before anything else runs
    pub mounts: Vec<MountSpec>,
    /// Whether to mount virtual filesystems
    pub mount_filesystems: bool,
    /// Whether to enforce PID 1 requirement
    pub require_pid1: bool,
    /// Foreground shell
    pub shell: ShellCommand,
    /// Value exported as `PS1` to the shell
    pub prompt: String,
    /// Idle time between reaper passes
    pub reap_interval_ms: u64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            services_dir: PathBuf::from("/etc/services"),
            log_dir: PathBuf::from("/var/log"),
            mounts: default_mounts(),
            mount_filesystems: true,
            require_pid1: true,
            shell: ShellCommand::default(),
            prompt: "[microinit]\\$ ".to_string(),
            reap_interval_ms: 1000,
        }
    }
}

impl InitConfig {
    /// Idle interval of the zombie reaper, never below
    /// [`MIN_REAP_INTERVAL_MS`].
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms.max(MIN_REAP_INTERVAL_MS))
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration file.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mount_order() {
        let targets: Vec<_> = default_mounts()
            .into_iter()
            .map(|m| (m.target, m.fstype))
            .collect();

        assert_eq!(
            targets,
            vec![
                (PathBuf::from("/dev"), "devtmpfs".to_string()),
                (PathBuf::from("/proc"), "proc".to_string()),
                (PathBuf::from("/sys"), "sysfs".to_string()),
                (PathBuf::from("/tmp"), "tmpfs".to_string()),
                (PathBuf::from("/run"), "tmpfs".to_string()),
            ]
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InitConfig::from_toml(
            r#"
services_dir = "/opt/services"
reap_interval_ms = 250

[shell]
program = "/bin/sh"
"#,
        )
        .unwrap();

        assert_eq!(config.services_dir, PathBuf::from("/opt/services"));
        assert_eq!(config.log_dir, PathBuf::from("/var/log"));
        assert_eq!(config.reap_interval(), Duration::from_millis(250));
        assert_eq!(config.shell.program, PathBuf::from("/bin/sh"));
        assert!(config.shell.args.is_empty());
        assert_eq!(config.mounts, default_mounts());
        assert!(config.require_pid1);
    }

    #[test]
    fn test_zero_reap_interval_is_clamped() {
        let config = InitConfig::from_toml("reap_interval_ms = 0").unwrap();

        assert_eq!(
            config.reap_interval(),
            Duration::from_millis(MIN_REAP_INTERVAL_MS)
        );
    }

    #[test]
    fn test_custom_mounts() {
        let config = InitConfig::from_toml(
            r#"
[[mounts]]
target = "/proc"
fstype = "proc"
"#,
        )
        .unwrap();

        assert_eq!(config.mounts, vec![MountSpec::new("/proc", "proc")]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = InitConfig::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.services_dir, PathBuf::from("/etc/services"));
        assert_eq!(config.shell, ShellCommand::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("microinit.toml");
        std::fs::write(&path, "services_dir = [").unwrap();

        match InitConfig::load(&path) {
            Err(Error::Config(msg)) => assert!(msg.contains("microinit.toml")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}

//! microinit binary.
//!
//! Started by the kernel as PID 1. With `--no-pid1` it can also be run from
//! a terminal, in which case the final reboot is only logged.

use clap::Parser;
use microinit::config::DEFAULT_CONFIG_PATH;
use microinit::{Init, InitConfig, ShutdownSignal};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default)]
#[command(
    name = "microinit",
    about = "Minimal PID 1 for ephemeral virtual machines",
    version
)]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Services directory
    #[arg(short, long)]
    services_dir: Option<PathBuf>,

    /// Directory for service logs
    #[arg(short, long)]
    log_dir: Option<PathBuf>,

    /// Foreground shell program
    #[arg(long)]
    shell: Option<PathBuf>,

    /// Argument passed to the shell (repeatable)
    #[arg(long = "shell-arg", allow_hyphen_values = true)]
    shell_args: Vec<String>,

    /// Don't require running as PID 1
    #[arg(long)]
    no_pid1: bool,

    /// Don't mount virtual filesystems
    #[arg(long)]
    no_mount: bool,
}

impl Cli {
    /// Layer the flags over the configuration file.
    fn into_config(self) -> InitConfig {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = InitConfig::load(&path).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring configuration file");
            InitConfig::default()
        });

        if let Some(dir) = self.services_dir {
            config.services_dir = dir;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = dir;
        }
        if let Some(shell) = self.shell {
            config.shell.program = shell;
            config.shell.args = self.shell_args;
        } else if !self.shell_args.is_empty() {
            config.shell.args = self.shell_args;
        }
        if self.no_pid1 {
            config.require_pid1 = false;
        }
        if self.no_mount {
            config.mount_filesystems = false;
        }

        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = run().await;

    match settle(std::process::id(), result) {
        Some(result) => result,
        None => {
            // Returning from PID 1 panics the kernel.
            error!("Still running after reboot request, halting here");
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

/// Decide what `main` does once the boot sequence gives up.
///
/// PID 1 logs any error and never returns (`None`); any other process
/// returns the result as-is.
fn settle(pid: u32, result: anyhow::Result<()>) -> Option<anyhow::Result<()>> {
    if pid != 1 {
        return Some(result);
    }
    if let Err(e) = result {
        error!(error = %e, "Init failed");
    }
    None
}

async fn run() -> anyhow::Result<()> {
    // Intercept SIGTERM and SIGINT before anything else runs.
    let shutdown = ShutdownSignal::install()?;

    // The kernel may pass arbitrary boot arguments; PID 1 never exits over them.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if std::process::id() != 1 => e.exit(),
        Err(e) => {
            warn!(error = %e, "Ignoring unrecognised arguments");
            Cli::default()
        }
    };

    let config = cli.into_config();
    let init = Init::new(config)?;

    match init.run(shutdown).await {
        Ok(request) => info!(request = ?request, "Shutdown handled"),
        Err(e) => error!(error = %e, "Shutdown failed"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("microinit.toml");
        std::fs::write(
            &path,
            "services_dir = \"/from/file\"\nlog_dir = \"/file/log\"\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "microinit",
            "--config",
            path.to_str().unwrap(),
            "--services-dir",
            "/from/flag",
            "--shell",
            "/bin/sh",
            "--shell-arg",
            "-l",
            "--no-pid1",
        ])
        .unwrap();
        let config = cli.into_config();

        assert_eq!(config.services_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.log_dir, PathBuf::from("/file/log"));
        assert_eq!(config.shell.program, PathBuf::from("/bin/sh"));
        assert_eq!(config.shell.args, vec!["-l".to_string()]);
        assert!(!config.require_pid1);
        assert!(config.mount_filesystems);
    }

    #[test]
    fn test_broken_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("microinit.toml");
        std::fs::write(&path, "mounts = 3").unwrap();

        let cli = Cli {
            config: Some(path),
            no_mount: true,
            ..Cli::default()
        };
        let config = cli.into_config();

        assert_eq!(config.services_dir, PathBuf::from("/etc/services"));
        assert!(!config.mount_filesystems);
    }

    #[test]
    fn test_pid1_never_returns_errors() {
        assert!(settle(1, Err(anyhow::anyhow!("signal handlers unavailable"))).is_none());
        assert!(settle(1, Ok(())).is_none());
    }

    #[test]
    fn test_other_pids_return_result() {
        match settle(4242, Err(anyhow::anyhow!("not PID 1"))) {
            Some(Err(e)) => assert_eq!(e.to_string(), "not PID 1"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(settle(4242, Ok(())), Some(Ok(()))));
    }

    #[test]
    fn test_unknown_kernel_arguments_fail_to_parse() {
        assert!(Cli::try_parse_from(["init", "single", "quiet"]).is_err());
    }
}

//! The interactive foreground session.

use crate::config::ShellCommand;
use crate::error::Error;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{info, warn};

/// How the foreground command ended. Every variant advances boot to the
/// shutdown phase.
#[derive(Debug)]
pub enum SessionEnd {
    /// The shell exited and we collected its status
    Exited(ExitStatus),
    /// The shell exited but the reaper collected its status first
    StatusLost,
    /// The shell could not be started at all
    SpawnFailed(Error),
}

/// A shell wired to the console.
#[derive(Debug, Clone)]
pub struct ForegroundSession {
    shell: ShellCommand,
    prompt: String,
}

impl ForegroundSession {
    pub fn new(shell: ShellCommand, prompt: impl Into<String>) -> Self {
        Self {
            shell,
            prompt: prompt.into(),
        }
    }

    /// The command as it will be spawned: inherited stdio and environment,
    /// plus `PS1`.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.shell.program);
        cmd.args(&self.shell.args)
            .env("PS1", &self.prompt)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    /// Run the shell until it exits for any reason.
    pub async fn run(&self) -> SessionEnd {
        info!(shell = %self.shell.program.display(), "Starting foreground shell");

        let mut child = match self.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(shell = %self.shell.program.display(), error = %e, "Failed to start shell");
                return SessionEnd::SpawnFailed(e.into());
            }
        };

        let end = match child.wait().await {
            Ok(status) => SessionEnd::Exited(status),
            Err(e) => {
                info!(error = %e, "Foreground shell exited, status collected by reaper");
                SessionEnd::StatusLost
            }
        };

        if let SessionEnd::Exited(status) = &end {
            info!(status = %status, "Foreground shell exited");
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> ShellCommand {
        ShellCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_ends_session() {
        let session = ForegroundSession::new(sh("exit 7"), "$ ");

        match session.run().await {
            SessionEnd::Exited(status) => assert_eq!(status.code(), Some(7)),
            other => panic!("unexpected end {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prompt_and_inherited_environment() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env");
        let script = format!(
            "printf '%s\\n%s' \"$PS1\" \"$PATH\" > {}",
            out.display()
        );

        let session = ForegroundSession::new(sh(&script), "[test]\\$ ");
        assert!(matches!(session.run().await, SessionEnd::Exited(s) if s.success()));

        let content = std::fs::read_to_string(&out).unwrap();
        let mut lines = content.splitn(2, '\n');
        assert_eq!(lines.next(), Some("[test]\\$ "));
        assert_eq!(
            lines.next().map(str::to_string),
            std::env::var("PATH").ok()
        );
    }

    #[tokio::test]
    async fn test_missing_shell_is_not_fatal() {
        let session = ForegroundSession::new(
            ShellCommand {
                program: PathBuf::from("/nonexistent/shell"),
                args: Vec::new(),
            },
            "$ ",
        );

        assert!(matches!(session.run().await, SessionEnd::SpawnFailed(_)));
    }
}

// file: src/executor/local.rs
// version: 2.0.0
// guid: 9a4f7c02-3e1d-4b68-8f95-d2c6a0b7e413

//! Local command execution on the host being provisioned

use super::{CommandOutcome, CommandRunner, HostCommand};
use crate::error::ProvisionError;
use crate::Result;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs commands and file operations directly on this machine
#[derive(Debug, Default)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CommandRunner for LocalHost {
    async fn run(&mut self, command: &HostCommand) -> Result<CommandOutcome> {
        debug!("Executing local command: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group: a Ctrl+C at the terminal must not kill a
        // half-finished iptables or apt invocation.
        #[cfg(unix)]
        cmd.process_group(0);

        let output = cmd.output().await.map_err(|e| ProvisionError::Execution {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        let outcome = CommandOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if outcome.is_success() {
            debug!("Command succeeded: {}", command);
        } else {
            debug!(
                "Command exited with {:?}: {} (stdout: {:?}, stderr: {:?})",
                outcome.exit_code,
                command,
                outcome.stdout.trim(),
                outcome.stderr.trim()
            );
        }

        Ok(outcome)
    }

    async fn read_file(&mut self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        debug!("Writing {} ({} bytes)", path.display(), contents.len());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        // Arrange
        let mut host = LocalHost::new();
        let cmd = HostCommand::shell("echo out; echo err >&2; exit 3");

        // Act
        let outcome = host.run(&cmd).await.unwrap();

        // Assert
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_run_missing_program_is_execution_error() {
        let mut host = LocalHost::new();
        let cmd = HostCommand::new("/nonexistent/definitely-not-a-binary");

        let err = host.run(&cmd).await.unwrap_err();

        assert!(err.is_execution());
    }

    #[tokio::test]
    async fn test_probe_reports_status() {
        let mut host = LocalHost::new();

        assert!(host.probe(&HostCommand::new("true")).await.unwrap());
        assert!(!host.probe(&HostCommand::new("false")).await.unwrap());
    }

    #[tokio::test]
    async fn test_env_is_passed_to_child() {
        let mut host = LocalHost::new();
        let cmd = HostCommand::shell("printf %s \"$PROVISION_TEST\"").env("PROVISION_TEST", "set");

        let outcome = host.run_checked(&cmd).await.unwrap();

        assert_eq!(outcome.stdout, "set");
    }

    #[tokio::test]
    async fn test_file_roundtrip_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("etc").join("fail2ban").join("jail.local");
        let mut host = LocalHost::new();

        assert_eq!(host.read_file(&path).await.unwrap(), None);
        host.write_file(&path, "[sshd]\n").await.unwrap();

        assert_eq!(host.read_file(&path).await.unwrap().as_deref(), Some("[sshd]\n"));
    }
}

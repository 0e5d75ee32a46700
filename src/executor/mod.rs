// file: src/executor/mod.rs
// version: 3.0.0
// guid: 0e6b2d47-8c19-4f53-a7d2-5b3f1e9c8a60

//! Host command execution
//!
//! Every interaction with the host goes through a [`CommandRunner`]: process
//! spawning as well as file reads and writes. Steps and the firewall engine
//! receive the runner as an explicit `&mut dyn CommandRunner` handle and never
//! touch the OS themselves, which lets tests swap in a [`RecordingHost`].

pub mod local;
pub mod recording;

pub use local::LocalHost;
pub use recording::{HostOp, RecordingHost};

use crate::error::ProvisionError;
use crate::Result;
use std::fmt;
use std::path::Path;
use tracing::error;

/// A single external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// `sh -c <script>`, for shell builtins and pipelines
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for HostCommand {
    /// Shell-style command line; environment overrides are not shown
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@+%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a non-zero exit into a [`ProvisionError::StepFailure`]
    pub fn into_checked(self, command: &HostCommand) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };

        error!("Command failed: {} (exit {:?})", command, self.exit_code);
        if !self.stdout.trim().is_empty() {
            error!("STDOUT: {}", self.stdout.trim());
        }
        if !self.stderr.trim().is_empty() {
            error!("STDERR: {}", self.stderr.trim());
        }

        Err(ProvisionError::StepFailure {
            command: command.to_string(),
            exit_code: self.exit_code,
            stderr: detail,
        })
    }
}

/// Executes privileged operations against the host
#[async_trait::async_trait]
pub trait CommandRunner: Send {
    /// Run a command to completion. A non-zero exit is returned, not raised;
    /// only a failure to spawn is an error.
    async fn run(&mut self, command: &HostCommand) -> Result<CommandOutcome>;

    /// Read a text file; `None` if it does not exist
    async fn read_file(&mut self, path: &Path) -> Result<Option<String>>;

    /// Replace a text file, creating parent directories as needed
    async fn write_file(&mut self, path: &Path, contents: &str) -> Result<()>;

    /// Run a command whose failure is an error
    async fn run_checked(&mut self, command: &HostCommand) -> Result<CommandOutcome> {
        self.run(command).await?.into_checked(command)
    }

    /// Run a command intended as a boolean check
    async fn probe(&mut self, command: &HostCommand) -> Result<bool> {
        Ok(self.run(command).await?.is_success())
    }

    /// Whether an executable is on the host's PATH
    async fn binary_exists(&mut self, name: &str) -> Result<bool> {
        self.probe(&HostCommand::shell(format!("command -v {}", name)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_only_when_needed() {
        let cmd = HostCommand::new("adduser")
            .args(["--disabled-password", "--gecos", "", "deploy"]);

        assert_eq!(cmd.to_string(), "adduser --disabled-password --gecos '' deploy");
    }

    #[test]
    fn test_display_shell_script() {
        let cmd = HostCommand::shell("command -v docker");

        assert_eq!(cmd.to_string(), "sh -c 'command -v docker'");
    }

    #[test]
    fn test_display_hides_env() {
        let cmd = HostCommand::new("apt-get")
            .arg("update")
            .env("DEBIAN_FRONTEND", "noninteractive");

        assert_eq!(cmd.to_string(), "apt-get update");
        assert_eq!(cmd.env.len(), 1);
    }

    #[test]
    fn test_quote_escapes_single_quote() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_into_checked_prefers_stderr() {
        let cmd = HostCommand::new("systemctl").args(["restart", "fail2ban"]);
        let outcome = CommandOutcome {
            exit_code: Some(1),
            stdout: "noise".to_string(),
            stderr: "Job failed".to_string(),
        };

        let err = outcome.into_checked(&cmd).unwrap_err();

        match err {
            ProvisionError::StepFailure { command, exit_code, stderr } => {
                assert_eq!(command, "systemctl restart fail2ban");
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr, "Job failed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_into_checked_passes_success() {
        let cmd = HostCommand::new("true");
        let outcome = CommandOutcome::success("ok");

        assert_eq!(outcome.clone().into_checked(&cmd).unwrap(), outcome);
    }
}

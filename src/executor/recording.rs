// file: src/executor/recording.rs
// version: 1.0.0
// guid: 61c8e3f5-2a07-4d9b-b4e1-7f0a5c92d836

//! In-memory host used by tests and the orchestrator's own checks
//!
//! Every operation is appended to an ordered log. Commands succeed with empty
//! output unless a scripted response matches the rendered command line by
//! prefix; one-shot responses are used first, then the most recently
//! registered persistent match wins.

use super::{CommandOutcome, CommandRunner, HostCommand};
use crate::error::ProvisionError;
use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One recorded host interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Run(String),
    Read(PathBuf),
    Write(PathBuf, String),
}

#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    ops: Vec<HostOp>,
    files: BTreeMap<PathBuf, String>,
    responses: Vec<(String, CommandOutcome)>,
    one_shot: Vec<(String, CommandOutcome)>,
    unspawnable: Vec<String>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Script the outcome of every command starting with `prefix`
    pub fn respond(mut self, prefix: impl Into<String>, outcome: CommandOutcome) -> Self {
        self.responses.push((prefix.into(), outcome));
        self
    }

    /// Script the outcome of the next matching command only; one-shot
    /// responses take precedence and are consumed in registration order
    pub fn respond_once(mut self, prefix: impl Into<String>, outcome: CommandOutcome) -> Self {
        self.one_shot.push((prefix.into(), outcome));
        self
    }

    /// Shorthand for a failing response
    pub fn fail(self, prefix: impl Into<String>) -> Self {
        self.respond(prefix, CommandOutcome::failure(1, "scripted failure"))
    }

    /// Commands starting with `prefix` cannot be spawned at all
    pub fn unspawnable(mut self, prefix: impl Into<String>) -> Self {
        self.unspawnable.push(prefix.into());
        self
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Rendered command lines in execution order
    pub fn commands(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                HostOp::Run(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Index of the first command starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.starts_with(prefix))
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }

    /// Forget recorded operations, keeping files and scripted responses
    pub fn clear_log(&mut self) {
        self.ops.clear();
    }
}

#[async_trait::async_trait]
impl CommandRunner for RecordingHost {
    async fn run(&mut self, command: &HostCommand) -> Result<CommandOutcome> {
        let line = command.to_string();
        self.ops.push(HostOp::Run(line.clone()));

        if self.unspawnable.iter().any(|p| line.starts_with(p.as_str())) {
            return Err(ProvisionError::Execution {
                command: line,
                message: "scripted spawn failure".to_string(),
            });
        }

        if let Some(index) = self
            .one_shot
            .iter()
            .position(|(prefix, _)| line.starts_with(prefix.as_str()))
        {
            return Ok(self.one_shot.remove(index).1);
        }

        let outcome = self
            .responses
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| CommandOutcome::success(""));

        Ok(outcome)
    }

    async fn read_file(&mut self, path: &Path) -> Result<Option<String>> {
        self.ops.push(HostOp::Read(path.to_path_buf()));
        Ok(self.files.get(path).cloned())
    }

    async fn write_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        self.ops
            .push(HostOp::Write(path.to_path_buf(), contents.to_string()));
        self.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}

// file: src/input/prompt.rs
// version: 1.0.0
// guid: 83b0d6e4-5c29-4a17-bf3e-d4a8c1e7f962

//! Operator prompts

use crate::error::ProvisionError;
use crate::Result;
use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

/// Source of answers for fields the static input does not cover
pub trait Prompter {
    /// Whether questions can be asked at all
    fn is_interactive(&self) -> bool;

    /// Ask one question and return the raw answer line.
    /// End of input is an error.
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String>;

    /// Tell the operator why an answer was rejected
    fn notify(&mut self, message: &str);
}

/// Prompts on stderr and reads answers from stdin
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        let mut stderr = io::stderr();
        match default {
            Some(d) if !d.is_empty() => write!(stderr, "{} [{}]: ", question, d)?,
            _ => write!(stderr, "{}: ", question)?,
        }
        stderr.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(ProvisionError::InteractiveRequired(format!(
                "input closed while waiting for: {}",
                question
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn notify(&mut self, message: &str) {
        eprintln!("  {}", message);
    }
}

/// Prompter fed from a fixed list of answers
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    interactive: bool,
    /// Questions asked, in order
    pub asked: Vec<String>,
    /// Rejection messages shown, in order
    pub notices: Vec<String>,
}

impl ScriptedPrompter {
    /// An attached terminal that answers with `answers`, then hits end of input
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            interactive: true,
            asked: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// No terminal attached
    pub fn detached() -> Self {
        Self::default()
    }
}

impl Prompter for ScriptedPrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn ask(&mut self, question: &str, _default: Option<&str>) -> Result<String> {
        self.asked.push(question.to_string());
        self.answers.pop_front().ok_or_else(|| {
            ProvisionError::InteractiveRequired(format!(
                "input closed while waiting for: {}",
                question
            ))
        })
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

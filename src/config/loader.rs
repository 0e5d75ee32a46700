// file: src/config/loader.rs
// version: 2.0.0
// guid: 2b8e6f14-0c7a-4a39-9d52-e1f4a7c3b605

//! Static configuration sources: process environment and env files

use super::keys;
use crate::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Raw, unvalidated key/value answers keyed by the names in [`keys`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInput {
    values: BTreeMap<String, String>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Value for a key; whitespace-only values count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pick the recognised keys out of an arbitrary variable list
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut raw = Self::new();
        for (key, value) in vars {
            let key = key.as_ref();
            if keys::ALL.contains(&key) {
                raw.set(key, value);
            }
        }
        raw
    }

    /// Recognised keys from the process environment
    pub fn from_process_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Overlay `other` on top of `self`; keys in `other` win
    pub fn merged_with(mut self, other: RawInput) -> Self {
        self.values.extend(other.values);
        self
    }
}

/// Loader for `KEY=VALUE` env files
pub struct ConfigLoader {
    line_pattern: Regex,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            line_pattern: Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$")
                .expect("env line pattern is valid"),
        }
    }

    /// Load an env file from disk
    pub fn load_env_file<P: AsRef<Path>>(&self, path: P) -> Result<RawInput> {
        let content = fs::read_to_string(&path).map_err(|e| {
            crate::error::ProvisionError::config(format!(
                "Failed to read env file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        self.parse_env(&content)
    }

    /// Parse env file content; unknown keys are ignored, malformed lines are errors
    pub fn parse_env(&self, content: &str) -> Result<RawInput> {
        let mut pairs = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let captures = self.line_pattern.captures(line).ok_or_else(|| {
                crate::error::ProvisionError::config(format!(
                    "Malformed env line {}: {}",
                    index + 1,
                    trimmed
                ))
            })?;

            let key = captures[1].to_string();
            let value = unquote(&captures[2]);
            if !keys::ALL.contains(&key.as_str()) {
                debug!("Ignoring unrecognised key {}", key);
                continue;
            }
            pairs.push((key, value));
        }

        Ok(RawInput::from_vars(pairs))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

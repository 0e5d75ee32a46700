// file: src/error.rs
// version: 3.0.0
// guid: 4d1c7e0a-93b2-4f5e-8a61-2b7f0c9d3e18

//! Error types for host provisioning

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors raised while collecting input or mutating the host
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Operator input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A value had to be prompted for but no terminal is available
    #[error("Interactive input required: {0}")]
    InteractiveRequired(String),

    /// The external command could not be spawned at all
    #[error("Failed to execute `{command}`: {message}")]
    Execution { command: String, message: String },

    /// The external command ran and reported failure
    #[error("`{command}` failed with exit code {}: {stderr}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    StepFailure {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Spawn failures abort the whole run regardless of which step hit them
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// Validation-class errors are operator mistakes, not host failures
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InteractiveRequired(_) | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_message_includes_exit_code() {
        let err = ProvisionError::StepFailure {
            command: "systemctl restart ssh".to_string(),
            exit_code: Some(5),
            stderr: "unit not found".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "`systemctl restart ssh` failed with exit code 5: unit not found"
        );
    }

    #[test]
    fn test_step_failure_without_exit_code() {
        let err = ProvisionError::StepFailure {
            command: "apt-get update".to_string(),
            exit_code: None,
            stderr: "killed".to_string(),
        };

        assert!(err.to_string().contains("exit code none"));
    }

    #[test]
    fn test_error_classification() {
        let exec = ProvisionError::Execution {
            command: "iptables -F".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert!(exec.is_execution());
        assert!(!exec.is_input_error());

        assert!(ProvisionError::validation("bad port").is_input_error());
        assert!(ProvisionError::InteractiveRequired("USER_NAME".into()).is_input_error());
    }
}

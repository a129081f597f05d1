//! Error types for etch-bench operations.
//!
//! Defines error types for the major subsystems:
//! - LLM endpoint interactions
//! - Code sandbox execution
//! - Host/run persistence
//! - Configuration loading

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to an LLM endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Invalid host URL '{0}'")]
    InvalidHost(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Model '{0}' not found on host")]
    ModelNotFound(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Reasons a sandboxed code execution earned no credit.
///
/// These are recorded as data on the test outcome; they never abort a battery.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SandboxFailure {
    #[error("No code extracted from response")]
    NoCode,

    #[error("Forbidden pattern: {pattern}")]
    Violation { pattern: String },

    #[error("Execution timeout ({seconds}s)")]
    Timeout { seconds: u64 },

    #[error("{diagnostic}")]
    Fault { diagnostic: String },
}

/// Errors that can occur in host and run persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned when a run cannot be started.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("host required")]
    MissingHost,

    #[error("start_run must be called from within a tokio runtime")]
    NoRuntime,
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_failure_messages() {
        assert_eq!(
            SandboxFailure::NoCode.to_string(),
            "No code extracted from response"
        );
        assert_eq!(
            SandboxFailure::Violation {
                pattern: "socket".to_string()
            }
            .to_string(),
            "Forbidden pattern: socket"
        );
        assert_eq!(
            SandboxFailure::Timeout { seconds: 5 }.to_string(),
            "Execution timeout (5s)"
        );
    }

    #[test]
    fn test_sandbox_failure_is_tagged() {
        let json = serde_json::to_value(SandboxFailure::Timeout { seconds: 5 }).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["seconds"], 5);
    }
}

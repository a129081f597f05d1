//! Configuration for sandboxed code execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Substrings that make generated code ineligible to run.
///
/// This is a coarse lexical screen for process, network, file and dynamic
/// evaluation access. It is not an isolation boundary.
pub const DEFAULT_DENY_PATTERNS: [&str; 8] = [
    "subprocess",
    "socket",
    "requests",
    "eval(",
    "exec(",
    "__import__",
    "open(",
    "os.system",
];

/// Callable names tried, in order, before falling back to any public function.
pub const DEFAULT_ENTRY_POINTS: [&str; 3] = ["solve", "solution", "main"];

/// Configuration for the code sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter executable used to run the harness.
    pub interpreter: String,
    /// Arguments passed before the harness path (`-I` isolates from user site/env).
    pub interpreter_args: Vec<String>,
    /// Wall-clock limit for one harness execution, in seconds.
    pub timeout_secs: u64,
    /// Deny-listed substrings.
    pub deny_patterns: Vec<String>,
    /// Callable names tried first, in order.
    pub entry_points: Vec<String>,
    /// How much stderr to keep in a fault diagnostic.
    pub stderr_preview_chars: usize,
    /// How much unparseable stdout to keep in a fault diagnostic.
    pub stdout_preview_chars: usize,
}

impl SandboxConfig {
    /// Creates a configuration using `interpreter` and the default policy.
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args: vec!["-I".to_string()],
            timeout_secs: 5,
            deny_patterns: DEFAULT_DENY_PATTERNS.iter().map(|p| p.to_string()).collect(),
            entry_points: DEFAULT_ENTRY_POINTS.iter().map(|p| p.to_string()).collect(),
            stderr_preview_chars: 200,
            stdout_preview_chars: 100,
        }
    }

    /// Sets the timeout, rounded up to whole seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.timeout_secs = (timeout.as_secs() + partial).max(1);
        self
    }

    /// Adds a deny-listed substring.
    pub fn with_deny_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.deny_patterns.push(pattern.into());
        self
    }

    /// Replaces the interpreter arguments.
    pub fn with_interpreter_args(mut self, args: Vec<String>) -> Self {
        self.interpreter_args = args;
        self
    }

    /// Returns the execution timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_config_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.interpreter_args, vec!["-I"]);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.deny_patterns.len(), 8);
        assert_eq!(config.entry_points[0], "solve");
    }

    #[test]
    fn test_sandbox_config_builder() {
        let config = SandboxConfig::new("python3.12")
            .with_timeout(Duration::from_secs(2))
            .with_deny_pattern("shutil")
            .with_interpreter_args(Vec::new());

        assert_eq!(config.interpreter, "python3.12");
        assert_eq!(config.timeout_secs, 2);
        assert!(config.deny_patterns.contains(&"shutil".to_string()));
        assert!(config.interpreter_args.is_empty());
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let config = SandboxConfig::default().with_timeout(Duration::from_millis(200));
        assert_eq!(config.timeout_secs, 1);
    }

    #[test]
    fn test_fractional_timeout_rounds_up() {
        let config = SandboxConfig::default().with_timeout(Duration::from_millis(1900));
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.timeout(), Duration::from_secs(2));

        let config = SandboxConfig::default().with_timeout(Duration::from_secs(3));
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SandboxConfig = serde_yaml::from_str("timeout_secs: 9\n").unwrap();
        assert_eq!(config.timeout_secs, 9);
        assert_eq!(config.interpreter, "python3");
    }
}

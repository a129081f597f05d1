//! Configuration for etch-bench.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! YAML file, and `ETCH_BENCH_*` environment variables. `OLLAMA_DEFAULT_HOST`
//! is also honored for the default host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::battery::{Battery, BatteryEvaluator, RepeatMode};
use crate::error::ConfigError;
use crate::runs::{OrchestratorConfig, DEFAULT_MODEL_MARKER, DEFAULT_PROGRESS_MARGIN};
use crate::sandbox::{SandboxConfig, SandboxRunner};

/// Default Ollama endpoint.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Configuration for runs, storage and the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Host used when none is given on the command line.
    pub default_host: String,
    /// Bearer token sent to the host.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// SQLite database holding saved hosts and run history.
    pub database_path: PathBuf,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Substring selecting models when none are requested.
    pub model_marker: String,
    /// Progress reserved for the save phase of a run.
    pub progress_margin: u8,
    /// How a run's `repeat` count is applied.
    pub repeat_mode: RepeatMode,
    /// Optional file receiving the latest summary as JSON.
    pub results_file: Option<PathBuf>,
    /// Optional YAML battery replacing the built-in tests.
    pub battery_file: Option<PathBuf>,
    /// How often the CLI polls a running run, in milliseconds.
    pub poll_interval_ms: u64,
    /// Code sandbox settings.
    pub sandbox: SandboxConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            default_host: DEFAULT_HOST.to_string(),
            api_key: None,
            database_path: PathBuf::from("etch-bench.db"),
            request_timeout_secs: 120,
            model_marker: DEFAULT_MODEL_MARKER.to_string(),
            progress_margin: DEFAULT_PROGRESS_MARGIN,
            repeat_mode: RepeatMode::Single,
            results_file: None,
            battery_file: None,
            poll_interval_ms: 1000,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Load a YAML file, then apply environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BenchConfig = serde_yaml::from_str(&content)?;
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (normally the process environment) and
    /// validate the result.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("OLLAMA_DEFAULT_HOST") {
            self.default_host = val;
        }

        if let Some(val) = lookup("ETCH_BENCH_HOST") {
            self.default_host = val;
        }

        if let Some(val) = lookup("ETCH_BENCH_API_KEY") {
            self.api_key = Some(val).filter(|k| !k.is_empty());
        }

        if let Some(val) = lookup("ETCH_BENCH_DB_PATH") {
            self.database_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("ETCH_BENCH_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env_value(&val, "ETCH_BENCH_REQUEST_TIMEOUT_SECS")?;
        }

        if let Some(val) = lookup("ETCH_BENCH_MODEL_MARKER") {
            self.model_marker = val;
        }

        if let Some(val) = lookup("ETCH_BENCH_PROGRESS_MARGIN") {
            self.progress_margin = parse_env_value(&val, "ETCH_BENCH_PROGRESS_MARGIN")?;
        }

        if let Some(val) = lookup("ETCH_BENCH_REPEAT_MODE") {
            self.repeat_mode = parse_repeat_mode(&val, "ETCH_BENCH_REPEAT_MODE")?;
        }

        if let Some(val) = lookup("ETCH_BENCH_RESULTS_FILE") {
            self.results_file = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("ETCH_BENCH_BATTERY_FILE") {
            self.battery_file = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("ETCH_BENCH_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_env_value(&val, "ETCH_BENCH_POLL_INTERVAL_MS")?;
        }

        // Sandbox settings
        if let Some(val) = lookup("ETCH_BENCH_PYTHON") {
            self.sandbox.interpreter = val;
        }

        if let Some(val) = lookup("ETCH_BENCH_SANDBOX_TIMEOUT_SECS") {
            self.sandbox.timeout_secs = parse_env_value(&val, "ETCH_BENCH_SANDBOX_TIMEOUT_SECS")?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_host.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_host cannot be empty".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.model_marker.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model_marker cannot be empty".to_string(),
            ));
        }

        if self.progress_margin >= 100 {
            return Err(ConfigError::ValidationFailed(
                "progress_margin must be below 100".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        // Sandbox validation
        if self.sandbox.interpreter.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "sandbox.interpreter cannot be empty".to_string(),
            ));
        }

        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "sandbox.timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the default host.
    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = host.into();
        self
    }

    /// Builder method to set the database path.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Builder method to set the repeat mode.
    pub fn with_repeat_mode(mut self, mode: RepeatMode) -> Self {
        self.repeat_mode = mode;
        self
    }

    /// Builder method to set the results file.
    pub fn with_results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }

    /// Builder method to set the battery file.
    pub fn with_battery_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.battery_file = Some(path.into());
        self
    }

    /// Builder method to set the sandbox configuration.
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let config = OrchestratorConfig::default()
            .with_model_marker(self.model_marker.clone())
            .with_progress_margin(self.progress_margin);
        match &self.results_file {
            Some(path) => config.with_results_file(path.clone()),
            None => config,
        }
    }

    /// The configured battery file, or the built-in battery.
    pub fn load_battery(&self) -> Result<Battery, ConfigError> {
        match &self.battery_file {
            Some(path) => Battery::from_yaml_file(path),
            None => Ok(Battery::builtin()),
        }
    }

    /// An evaluator wired with this configuration's battery and sandbox.
    pub fn build_evaluator(&self) -> Result<BatteryEvaluator, ConfigError> {
        Ok(BatteryEvaluator::new(
            self.load_battery()?,
            SandboxRunner::new(self.sandbox.clone()),
        )
        .with_repeat_mode(self.repeat_mode))
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

pub(crate) fn parse_repeat_mode(value: &str, key: &str) -> Result<RepeatMode, ConfigError> {
    match value.to_lowercase().as_str() {
        "single" => Ok(RepeatMode::Single),
        "aggregate" => Ok(RepeatMode::Aggregate),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected 'single' or 'aggregate', got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.default_host, "http://localhost:11434");
        assert_eq!(config.model_marker, "etch");
        assert_eq!(config.progress_margin, 5);
        assert_eq!(config.repeat_mode, RepeatMode::Single);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = BenchConfig::default()
            .with_overrides(lookup(&[
                ("OLLAMA_DEFAULT_HOST", "http://gpu-box:11434"),
                ("ETCH_BENCH_REPEAT_MODE", "Aggregate"),
                ("ETCH_BENCH_SANDBOX_TIMEOUT_SECS", "9"),
                ("ETCH_BENCH_API_KEY", ""),
            ]))
            .unwrap();

        assert_eq!(config.default_host, "http://gpu-box:11434");
        assert_eq!(config.repeat_mode, RepeatMode::Aggregate);
        assert_eq!(config.sandbox.timeout_secs, 9);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_etch_host_wins_over_ollama_host() {
        let config = BenchConfig::default()
            .with_overrides(lookup(&[
                ("OLLAMA_DEFAULT_HOST", "http://a:11434"),
                ("ETCH_BENCH_HOST", "http://b:11434"),
            ]))
            .unwrap();
        assert_eq!(config.default_host, "http://b:11434");
    }

    #[test]
    fn test_invalid_override() {
        let result =
            BenchConfig::default().with_overrides(lookup(&[("ETCH_BENCH_PROGRESS_MARGIN", "lots")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result =
            BenchConfig::default().with_overrides(lookup(&[("ETCH_BENCH_REPEAT_MODE", "twice")]));
        assert!(result.unwrap_err().to_string().contains("ETCH_BENCH_REPEAT_MODE"));
    }

    #[test]
    fn test_validation() {
        let mut config = BenchConfig::default();
        config.progress_margin = 100;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("progress_margin"));

        let config = BenchConfig::default().with_sandbox(SandboxConfig::new(""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("etch-bench.yaml");
        std::fs::write(
            &path,
            "default_host: http://yaml-host:11434\nrepeat_mode: aggregate\nsandbox:\n  timeout_secs: 3\n",
        )
        .unwrap();

        let config: BenchConfig =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.default_host, "http://yaml-host:11434");
        assert_eq!(config.repeat_mode, RepeatMode::Aggregate);
        assert_eq!(config.sandbox.timeout_secs, 3);
        assert_eq!(config.sandbox.interpreter, "python3");
        assert_eq!(config.model_marker, "etch");
    }

    #[test]
    fn test_orchestrator_config_and_battery() {
        let config = BenchConfig::default().with_results_file("latest_results.json");
        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.model_marker, "etch");
        assert_eq!(
            orchestrator.results_file,
            Some(PathBuf::from("latest_results.json"))
        );
        assert_eq!(config.load_battery().unwrap(), Battery::builtin());
    }
}

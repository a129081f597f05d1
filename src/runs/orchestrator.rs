//! Background execution of benchmark runs.
//!
//! [`RunOrchestrator::start_run`] registers a run and returns its id at once.
//! The work happens on a spawned tokio task that reports progress and
//! messages into the [`RunRegistry`] and ends in exactly one terminal state:
//! `done` with a [`Summary`], or `error`. A panic inside the work is caught
//! at the task boundary and recorded as an error too.
//!
//! # Example
//!
//! ```ignore
//! use etch_bench::runs::{RunOrchestrator, RunRequest};
//!
//! let id = orchestrator.start_run(RunRequest::new("http://localhost:11434"))?;
//! loop {
//!     let run = orchestrator.get_run_status(&id).unwrap();
//!     println!("{}% {:?}", run.progress, run.messages.last());
//!     if run.status.is_terminal() { break; }
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//! }
//! ```

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::registry::RunRegistry;
use super::run::{Run, RunMetadata, Summary, TopSummary};
use crate::battery::BatteryEvaluator;
use crate::error::RunError;
use crate::llm::{normalize_models, ClientFactory};
use crate::metrics::MetricsCollector;
use crate::storage::BenchStore;

/// Default substring selecting models when none are requested.
pub const DEFAULT_MODEL_MARKER: &str = "etch";

/// Progress left for saving once every model is tested.
pub const DEFAULT_PROGRESS_MARGIN: u8 = 5;

/// Parameters of a run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub host: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// Models to test; empty selects every model matching the marker.
    #[serde(default)]
    pub models: Vec<String>,
}

fn default_repeat() -> u32 {
    1
}

impl RunRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: None,
            repeat: 1,
            models: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }
}

/// Tunables for the background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Case-insensitive substring used to pick models when none are requested.
    pub model_marker: String,
    /// Progress reserved for the save phase.
    pub progress_margin: u8,
    /// Where to also write the latest summary as pretty JSON.
    pub results_file: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model_marker: DEFAULT_MODEL_MARKER.to_string(),
            progress_margin: DEFAULT_PROGRESS_MARGIN,
            results_file: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_model_marker(mut self, marker: impl Into<String>) -> Self {
        self.model_marker = marker.into();
        self
    }

    pub fn with_progress_margin(mut self, margin: u8) -> Self {
        self.progress_margin = margin.min(100);
        self
    }

    pub fn with_results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }
}

/// Starts runs and exposes their state.
#[derive(Clone)]
pub struct RunOrchestrator {
    registry: Arc<RunRegistry>,
    clients: Arc<dyn ClientFactory>,
    store: Arc<dyn BenchStore>,
    evaluator: Arc<BatteryEvaluator>,
    config: Arc<OrchestratorConfig>,
    metrics: MetricsCollector,
}

impl RunOrchestrator {
    pub fn new(
        clients: Arc<dyn ClientFactory>,
        store: Arc<dyn BenchStore>,
        evaluator: BatteryEvaluator,
    ) -> Self {
        Self {
            registry: Arc::new(RunRegistry::new()),
            clients,
            store,
            evaluator: Arc::new(evaluator),
            config: Arc::new(OrchestratorConfig::default()),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Register a run and start it in the background.
    ///
    /// Returns immediately with the run id. Must be called from within a
    /// tokio runtime.
    pub fn start_run(&self, request: RunRequest) -> Result<String, RunError> {
        if request.host.trim().is_empty() {
            return Err(RunError::MissingHost);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RunError::NoRuntime)?;

        let id = self.registry.create(RunMetadata {
            host: request.host.clone(),
            models: request.models.clone(),
            repeat: request.repeat,
        });
        info!(run_id = %id, host = %request.host, "Run created");

        let worker = RunWorker {
            id: id.clone(),
            request,
            orchestrator: self.clone(),
        };
        let registry = Arc::clone(&self.registry);
        let metrics = self.metrics;
        let run_id = id.clone();

        let work = runtime.spawn(worker.execute());
        runtime.spawn(async move {
            let status = match work.await {
                Ok(Ok(summary)) => {
                    registry.set_result(&run_id, summary);
                    info!(run_id = %run_id, "Run finished");
                    "done"
                }
                Ok(Err(e)) => {
                    error!(run_id = %run_id, error = %e, "Run failed");
                    registry.set_error(&run_id, format!("{:#}", e));
                    "error"
                }
                Err(join_error) => {
                    let reason = if join_error.is_panic() {
                        panic_message(join_error.into_panic())
                    } else {
                        join_error.to_string()
                    };
                    error!(run_id = %run_id, reason = %reason, "Run task aborted");
                    registry.set_error(&run_id, format!("Run aborted: {}", reason));
                    "error"
                }
            };
            metrics.record_run_finished(status);
        });

        Ok(id)
    }

    /// Snapshot of one run.
    pub fn get_run_status(&self, id: &str) -> Option<Run> {
        self.registry.get(id)
    }

    /// Snapshot of every run, oldest first.
    pub fn list_runs(&self) -> Vec<Run> {
        self.registry.list()
    }
}

/// The background unit of work for one run.
struct RunWorker {
    id: String,
    request: RunRequest,
    orchestrator: RunOrchestrator,
}

impl RunWorker {
    fn message(&self, message: impl Into<String>) {
        let message = message.into();
        info!(run_id = %self.id, "{}", message);
        self.orchestrator.registry.append_message(&self.id, message);
    }

    fn progress(&self, progress: u8) {
        self.orchestrator.registry.set_progress(&self.id, progress);
    }

    async fn execute(self) -> Result<Summary> {
        let registry = &self.orchestrator.registry;
        let config = &self.orchestrator.config;
        let host = self.request.host.trim();

        registry.mark_running(&self.id);
        self.orchestrator.metrics.record_run_started();
        self.message("Starting run...");

        let client = self
            .orchestrator
            .clients
            .connect(host, self.request.api_key.as_deref())?;
        let listings = client.list_models().await?;

        if let Err(e) = self.orchestrator.store.record_host(host).await {
            warn!(run_id = %self.id, host = host, error = %e, "Failed to save host");
        }

        let available = normalize_models(&listings);
        let selected = select_models(&available, &self.request.models, &config.model_marker);
        info!(
            run_id = %self.id,
            available = available.len(),
            selected = selected.len(),
            "Models selected"
        );

        let mut summary = Summary::new(host, available);
        let total = selected.len();
        let ceiling = 100 - config.progress_margin.min(100);

        for (index, model) in selected.iter().enumerate() {
            let position = index + 1;
            self.message(format!("Testing model: {} ({}/{})...", model, position, total));
            self.progress(scaled_progress(100, index, total));

            let report = self
                .orchestrator
                .evaluator
                .test_model(client.as_ref(), model, self.request.repeat)
                .await;

            self.message(format!(
                "Completed {}: smartness={}% code={}% mean={}s",
                model,
                report.smartness_score,
                report.code_score,
                report
                    .mean_latency()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "n/a".to_string())
            ));
            self.progress(scaled_progress(ceiling, position, total));
            summary.models_tested.push(report);
        }

        self.progress(ceiling);
        summary.top_summary = TopSummary::from_reports(&summary.models_tested);
        self.message("Tests complete; saving result");

        if let Some(path) = &config.results_file {
            match write_results_file(path, &summary).await {
                Ok(()) => self.message(format!("Saved results to {}", path.display())),
                Err(e) => self.message(format!("Failed to save results: {:#}", e)),
            }
        }

        match self.orchestrator.store.persist_summary(&summary).await {
            Ok(record_id) => {
                summary.record_id = Some(record_id);
                self.message(format!("Saved run into DB (id={})", record_id));
            }
            Err(e) => self.message(format!("Failed to persist run to DB: {}", e)),
        }

        Ok(summary)
    }
}

/// Requested models that exist on the host, in request order, or every
/// available model whose name contains `marker` (case-insensitive).
pub fn select_models(available: &[String], requested: &[String], marker: &str) -> Vec<String> {
    if requested.is_empty() {
        let marker = marker.to_lowercase();
        return available
            .iter()
            .filter(|name| name.to_lowercase().contains(&marker))
            .cloned()
            .collect();
    }

    let mut selected: Vec<String> = Vec::new();
    for name in requested {
        if available.contains(name) && !selected.contains(name) {
            selected.push(name.clone());
        }
    }
    selected
}

/// `floor(scale * done / total)`, 0 when there is nothing to do.
fn scaled_progress(scale: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (usize::from(scale) * done.min(total) / total) as u8
}

async fn write_results_file(path: &Path, summary: &Summary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_models_by_marker() {
        let available = names(&["llama3:8b", "Etch-Coder:7b", "etch:1b"]);
        assert_eq!(
            select_models(&available, &[], "etch"),
            names(&["Etch-Coder:7b", "etch:1b"])
        );
    }

    #[test]
    fn test_select_requested_models_that_exist() {
        let available = names(&["llama3:8b", "etch:1b"]);
        let requested = names(&["etch:1b", "missing:1b", "llama3:8b", "etch:1b"]);
        assert_eq!(
            select_models(&available, &requested, "etch"),
            names(&["etch:1b", "llama3:8b"])
        );
    }

    #[test]
    fn test_scaled_progress() {
        assert_eq!(scaled_progress(100, 0, 3), 0);
        assert_eq!(scaled_progress(100, 1, 3), 33);
        assert_eq!(scaled_progress(95, 1, 3), 31);
        assert_eq!(scaled_progress(95, 3, 3), 95);
        assert_eq!(scaled_progress(95, 0, 0), 0);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: RunRequest =
            serde_json::from_str(r#"{"host": "http://localhost:11434"}"#).unwrap();
        assert_eq!(request.repeat, 1);
        assert!(request.models.is_empty());
        assert!(request.api_key.is_none());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "panic: boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "panic: bang");
        assert_eq!(panic_message(Box::new(7u8)), "panic");
    }

    #[test]
    fn test_start_run_requires_host() {
        let orchestrator = RunOrchestrator::new(
            Arc::new(crate::llm::OllamaClientFactory::default()),
            Arc::new(crate::storage::MemoryStore::new()),
            BatteryEvaluator::default(),
        );
        assert!(matches!(
            orchestrator.start_run(RunRequest::new("  ")),
            Err(RunError::MissingHost)
        ));
    }

    #[test]
    fn test_start_run_outside_runtime() {
        let orchestrator = RunOrchestrator::new(
            Arc::new(crate::llm::OllamaClientFactory::default()),
            Arc::new(crate::storage::MemoryStore::new()),
            BatteryEvaluator::default(),
        );
        assert!(matches!(
            orchestrator.start_run(RunRequest::new("http://localhost:11434")),
            Err(RunError::NoRuntime)
        ));
        assert!(orchestrator.list_runs().is_empty());
    }
}

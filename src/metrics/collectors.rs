//! Metric recording facade.
//!
//! `MetricsCollector` wraps the raw Prometheus statics so call sites stay one
//! line. Every method is a no-op until [`init_metrics`](super::init_metrics)
//! has run, which keeps library users and tests free of global setup.

use super::prometheus::{
    ACTIVE_RUNS, BATTERY_SCORE, LLM_LATENCY, LLM_REQUESTS_TOTAL, RUNS_TOTAL, SANDBOX_DURATION,
    SANDBOX_EXECUTIONS_TOTAL,
};

/// Metrics collector for recording etch-bench operational metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Create a new MetricsCollector instance.
    pub fn new() -> Self {
        Self
    }

    /// Record that a run's background task started.
    pub fn record_run_started(&self) {
        if let Some(active) = ACTIVE_RUNS.get() {
            active.inc();
        }
    }

    /// Record that a run reached a terminal `status` ("done" or "error").
    pub fn record_run_finished(&self, status: &str) {
        if let Some(active) = ACTIVE_RUNS.get() {
            active.dec();
        }
        if let Some(runs) = RUNS_TOTAL.get() {
            runs.with_label_values(&[status]).inc();
        }
        tracing::trace!(status = status, "Recorded run metric");
    }

    /// Record one chat request.
    pub fn record_llm_request(&self, model: &str, success: bool, latency_secs: f64) {
        let status = if success { "success" } else { "error" };
        if let Some(requests) = LLM_REQUESTS_TOTAL.get() {
            requests.with_label_values(&[model, status]).inc();
        }
        if let Some(latency) = LLM_LATENCY.get() {
            latency.with_label_values(&[model]).observe(latency_secs);
        }
    }

    /// Record one sandbox execution and how it ended.
    ///
    /// `outcome` is one of "completed", "no_code", "violation", "timeout" or "fault".
    pub fn record_sandbox(&self, outcome: &str, duration_secs: f64) {
        if let Some(executions) = SANDBOX_EXECUTIONS_TOTAL.get() {
            executions.with_label_values(&[outcome]).inc();
        }
        if let Some(duration) = SANDBOX_DURATION.get() {
            duration.observe(duration_secs);
        }
    }

    /// Record a battery score for one model.
    pub fn record_score(&self, battery: &str, score: f64) {
        if let Some(scores) = BATTERY_SCORE.get() {
            scores.with_label_values(&[battery]).observe(score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{export_metrics, init_metrics};

    #[test]
    fn test_recording_without_init_is_noop() {
        let collector = MetricsCollector::new();
        collector.record_llm_request("etch:7b", true, 0.5);
        collector.record_sandbox("timeout", 5.0);
    }

    #[test]
    fn test_recorded_metrics_are_exported() {
        init_metrics().unwrap();
        let collector = MetricsCollector::new();
        collector.record_run_started();
        collector.record_sandbox("violation", 0.0);
        collector.record_score("code", 80.0);
        collector.record_run_finished("done");

        let text = export_metrics();
        assert!(text.contains("etch_bench_sandbox_executions_total"));
        assert!(text.contains("outcome=\"violation\""));
    }
}

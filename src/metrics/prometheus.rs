//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by etch-bench and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all etch-bench metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total runs that reached a terminal state, labeled by status.
pub static RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Number of runs currently executing.
pub static ACTIVE_RUNS: OnceLock<Gauge> = OnceLock::new();

/// Total chat requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Chat request latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total sandbox executions, labeled by outcome.
pub static SANDBOX_EXECUTIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Sandbox execution wall time in seconds.
pub static SANDBOX_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Distribution of battery scores (0-100), labeled by battery.
pub static BATTERY_SCORE: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Calling this more than once is harmless: later calls leave the first
/// registry in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric creation or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let runs_total = CounterVec::new(
        Opts::new("etch_bench_runs_total", "Total runs that finished"),
        &["status"],
    )?;

    let active_runs = Gauge::new("etch_bench_active_runs", "Number of runs currently executing")?;

    let llm_requests_total = CounterVec::new(
        Opts::new("etch_bench_llm_requests_total", "Total chat requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        HistogramOpts::new(
            "etch_bench_llm_latency_seconds",
            "Chat request latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["model"],
    )?;

    let sandbox_executions_total = CounterVec::new(
        Opts::new(
            "etch_bench_sandbox_executions_total",
            "Total sandbox executions",
        ),
        &["outcome"],
    )?;

    let sandbox_duration = Histogram::with_opts(
        HistogramOpts::new(
            "etch_bench_sandbox_duration_seconds",
            "Sandbox execution wall time in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )?;

    let battery_score = HistogramVec::new(
        HistogramOpts::new("etch_bench_battery_score", "Distribution of battery scores")
            .buckets(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]),
        &["battery"],
    )?;

    registry.register(Box::new(runs_total.clone()))?;
    registry.register(Box::new(active_runs.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(sandbox_executions_total.clone()))?;
    registry.register(Box::new(sandbox_duration.clone()))?;
    registry.register(Box::new(battery_score.clone()))?;

    // If any of these fail, metrics were initialized concurrently (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = RUNS_TOTAL.set(runs_total);
    let _ = ACTIVE_RUNS.set(active_runs);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = SANDBOX_EXECUTIONS_TOTAL.set(sandbox_executions_total);
    let _ = SANDBOX_DURATION.set(sandbox_duration);
    let _ = BATTERY_SCORE.set(battery_score);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

//! Metrics module for Prometheus-based monitoring.
//!
//! Counts runs, chat requests and sandbox executions, and tracks the score
//! distribution per battery.
//!
//! ```ignore
//! use etch_bench::metrics::{export_metrics, init_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_sandbox("completed", 0.12);
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use self::prometheus::{export_metrics, init_metrics};

pub use self::prometheus::{
    ACTIVE_RUNS, BATTERY_SCORE, LLM_LATENCY, LLM_REQUESTS_TOTAL, REGISTRY, RUNS_TOTAL,
    SANDBOX_DURATION, SANDBOX_EXECUTIONS_TOTAL,
};

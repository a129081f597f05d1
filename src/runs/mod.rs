//! Run tracking and orchestration.
//!
//! - [`RunRegistry`]: lock-guarded in-memory state of every run
//! - [`RunOrchestrator`]: starts runs on background tasks and drives them to
//!   a terminal state

pub mod orchestrator;
pub mod registry;
pub mod run;

pub use orchestrator::{
    select_models, OrchestratorConfig, RunOrchestrator, RunRequest, DEFAULT_MODEL_MARKER,
    DEFAULT_PROGRESS_MARGIN,
};
pub use registry::RunRegistry;
pub use run::{
    BestCodeModel, BestSmartModel, FastestModel, Run, RunMetadata, RunStatus, Summary, TopSummary,
};

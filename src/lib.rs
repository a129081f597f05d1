//! etch-bench: benchmark LLMs served by Ollama-compatible hosts.
//!
//! A run asks each selected model a battery of reasoning questions and
//! coding tasks, executes the returned code in a sandboxed interpreter, and
//! condenses the scores and latencies into a summary that is kept in a run
//! registry and persisted to storage.

pub mod battery;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod runs;
pub mod sandbox;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::BenchConfig;
pub use error::{ConfigError, LlmError, RunError, SandboxFailure, StorageError};
pub use runs::{Run, RunOrchestrator, RunRequest, RunStatus, Summary};

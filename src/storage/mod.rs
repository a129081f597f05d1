//! Persistence of saved hosts and finished run summaries.
//!
//! # Overview
//!
//! - **BenchStore**: the async interface the orchestrator and CLI talk to
//! - **SqliteStore**: SQLite file with `hosts` and `runs` tables, summaries
//!   stored as JSON
//! - **MemoryStore**: process-local store for tests and throwaway runs
//!
//! # Usage
//!
//! ```rust,ignore
//! use etch_bench::storage::{BenchStore, SqliteStore};
//!
//! let store = SqliteStore::open("etch-bench.db").await?;
//! store.record_host("http://localhost:11434").await?;
//! let id = store.persist_summary(&summary).await?;
//! let again = store.fetch_run_record(id).await?;
//! ```

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::error::StorageError;
use crate::runs::Summary;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A host URL remembered for later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedHost {
    pub url: String,
    pub added_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Listing row for a persisted run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub host: Option<String>,
}

/// Storage backend for hosts and run summaries.
#[async_trait]
pub trait BenchStore: Send + Sync {
    /// Remember `url`, or bump it to the top if it is already known.
    async fn record_host(&self, url: &str) -> Result<(), StorageError>;

    /// Saved hosts, most recently used first.
    async fn list_hosts(&self) -> Result<Vec<SavedHost>, StorageError>;

    /// Forget `url`. Returns false if it was not saved.
    async fn delete_host(&self, url: &str) -> Result<bool, StorageError>;

    /// Store a finished summary and return its record id.
    async fn persist_summary(&self, summary: &Summary) -> Result<i64, StorageError>;

    /// Persisted runs, newest first.
    async fn list_run_records(&self) -> Result<Vec<RunRecord>, StorageError>;

    /// The stored summary for `id`, with `record_id` filled in.
    async fn fetch_run_record(&self, id: i64) -> Result<Option<Summary>, StorageError>;
}

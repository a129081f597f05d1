//! In-process store, used by tests and `--no-db` runs.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{BenchStore, RunRecord, SavedHost, StorageError};
use crate::runs::Summary;

#[derive(Debug, Default)]
struct MemoryState {
    hosts: Vec<SavedHost>,
    runs: Vec<(RunRecord, Summary)>,
}

/// Keeps hosts and summaries in memory for the life of the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BenchStore for MemoryStore {
    async fn record_host(&self, url: &str) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        match state.hosts.iter().position(|h| h.url == url) {
            Some(index) => {
                let mut host = state.hosts.remove(index);
                host.last_used_at = now;
                state.hosts.insert(0, host);
            }
            None => state.hosts.insert(
                0,
                SavedHost {
                    url: url.to_string(),
                    added_at: now,
                    last_used_at: now,
                },
            ),
        }
        Ok(())
    }

    async fn list_hosts(&self) -> Result<Vec<SavedHost>, StorageError> {
        Ok(self.state.read().await.hosts.clone())
    }

    async fn delete_host(&self, url: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        let before = state.hosts.len();
        state.hosts.retain(|h| h.url != url);
        Ok(state.hosts.len() < before)
    }

    async fn persist_summary(&self, summary: &Summary) -> Result<i64, StorageError> {
        let mut state = self.state.write().await;
        let id = state.runs.len() as i64 + 1;
        let record = RunRecord {
            id,
            created_at: Utc::now(),
            host: Some(summary.host.clone()),
        };
        state.runs.push((record, summary.clone()));
        Ok(id)
    }

    async fn list_run_records(&self) -> Result<Vec<RunRecord>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .iter()
            .rev()
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn fetch_run_record(&self, id: i64) -> Result<Option<Summary>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .iter()
            .find(|(record, _)| record.id == id)
            .map(|(_, summary)| {
                let mut summary = summary.clone();
                summary.record_id = Some(id);
                summary
            }))
    }
}

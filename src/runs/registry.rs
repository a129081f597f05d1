//! In-memory registry of run state.
//!
//! One `RwLock` guards every run. Mutations take the write lock, snapshots
//! the read lock. Mutations on unknown ids are silent no-ops; transitions the
//! lifecycle forbids and progress decreases are dropped with a warning.
//!
//! The registry keeps every run for the life of the process.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;
use uuid::Uuid;

use super::run::{Run, RunMetadata, RunStatus, Summary};

#[derive(Debug, Default)]
struct RegistryState {
    runs: HashMap<String, Run>,
    /// Run ids in creation order.
    order: Vec<String>,
}

/// Thread-safe store of runs keyed by id.
#[derive(Debug, Default)]
pub struct RunRegistry {
    state: RwLock<RegistryState>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a pending run and returns its id (32 lowercase hex chars).
    pub fn create(&self, metadata: RunMetadata) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let mut state = self.write();
        state.runs.insert(id.clone(), Run::new(id.clone(), metadata));
        state.order.push(id.clone());
        id
    }

    /// Applies `f` to the run if it exists.
    fn update(&self, id: &str, f: impl FnOnce(&mut Run)) {
        let mut state = self.write();
        if let Some(run) = state.runs.get_mut(id) {
            f(run);
        }
    }

    fn transition(run: &mut Run, to: RunStatus) -> bool {
        if !run.status.can_transition(to) {
            warn!(
                run_id = %run.id,
                from = %run.status,
                to = %to,
                "Ignoring invalid run status transition"
            );
            return false;
        }
        run.status = to;
        run.touch();
        true
    }

    pub fn mark_running(&self, id: &str) {
        self.update(id, |run| {
            Self::transition(run, RunStatus::Running);
        });
    }

    pub fn append_message(&self, id: &str, message: impl Into<String>) {
        let message = message.into();
        self.update(id, |run| {
            run.messages.push(message);
            run.touch();
        });
    }

    /// Raises progress to `progress` (capped at 100) while the run is active.
    pub fn set_progress(&self, id: &str, progress: u8) {
        let progress = progress.min(100);
        self.update(id, |run| {
            if run.status.is_terminal() {
                warn!(run_id = %run.id, status = %run.status, "Ignoring progress on finished run");
                return;
            }
            if progress < run.progress {
                warn!(
                    run_id = %run.id,
                    current = run.progress,
                    requested = progress,
                    "Ignoring progress decrease"
                );
                return;
            }
            run.progress = progress;
            run.touch();
        });
    }

    /// Stores the summary and marks the run done at 100%.
    pub fn set_result(&self, id: &str, summary: Summary) {
        self.update(id, |run| {
            if Self::transition(run, RunStatus::Done) {
                run.result = Some(summary);
                run.progress = 100;
            }
        });
    }

    /// Marks the run failed and appends `error` to its messages.
    pub fn set_error(&self, id: &str, error: impl Into<String>) {
        let error = error.into();
        self.update(id, |run| {
            if Self::transition(run, RunStatus::Error) {
                run.messages.push(error);
            }
        });
    }

    /// Snapshot of one run.
    pub fn get(&self, id: &str) -> Option<Run> {
        self.read().runs.get(id).cloned()
    }

    /// Snapshot of every run, oldest first.
    pub fn list(&self) -> Vec<Run> {
        let state = self.read();
        state
            .order
            .iter()
            .filter_map(|id| state.runs.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! The run-store collaborator interface.
//!
//! The supervisor only reads runs and writes back derived status; where the
//! records live is up to the implementation.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Run, RunStatus};

/// Errors raised by [`RunStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No run matches the given issue/run reference.
    #[error("run not found: {issue_id}/{run_ref}")]
    NotFound { issue_id: String, run_ref: String },

    /// A short-id prefix matches more than one run.
    #[error("run reference {run_ref:?} is ambiguous for issue {issue_id}: matches {}", candidates.join(", "))]
    Ambiguous {
        issue_id: String,
        run_ref: String,
        candidates: Vec<String>,
    },

    /// An issue or run id cannot name a record.
    #[error("invalid id {id:?}: must be non-empty and contain no path separators or '..'")]
    InvalidId { id: String },

    /// Reading or writing the backing storage failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be decoded.
    #[error("malformed run record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read/write access to run records.
///
/// Implementations must tolerate concurrent readers; the daemon serves many
/// connections against one store.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Fetch a run by its exact id.
    async fn get_run(&self, issue_id: &str, run_id: &str) -> Result<Run, StoreError>;

    /// List every run recorded for an issue.
    async fn list_runs(&self, issue_id: &str) -> Result<Vec<Run>, StoreError>;

    /// Insert or replace a run record.
    async fn save_run(&self, run: &Run) -> Result<(), StoreError>;

    /// Where the record for a run lives on disk, for stores that have one.
    fn record_path(&self, _issue_id: &str, _run_id: &str) -> Option<PathBuf> {
        None
    }

    /// Resolve a run by exact id or unique short-id prefix.
    async fn resolve_run(&self, issue_id: &str, run_ref: &str) -> Result<Run, StoreError> {
        match self.get_run(issue_id, run_ref).await {
            Ok(run) => Ok(run),
            Err(StoreError::NotFound { .. }) => {
                let runs = self.list_runs(issue_id).await?;
                resolve_prefix(issue_id, run_ref, runs)
            }
            Err(e) => Err(e),
        }
    }

    /// Write back a derived status and return the updated record.
    async fn update_status(
        &self,
        issue_id: &str,
        run_id: &str,
        status: RunStatus,
    ) -> Result<Run, StoreError> {
        let mut run = self.get_run(issue_id, run_id).await?;
        run.set_status(status);
        self.save_run(&run).await?;
        Ok(run)
    }
}

/// Pick the single run whose id starts with `run_ref`.
pub fn resolve_prefix(issue_id: &str, run_ref: &str, runs: Vec<Run>) -> Result<Run, StoreError> {
    let not_found = || StoreError::NotFound {
        issue_id: issue_id.to_owned(),
        run_ref: run_ref.to_owned(),
    };

    if run_ref.is_empty() {
        return Err(not_found());
    }

    let mut matches: Vec<Run> = runs
        .into_iter()
        .filter(|r| r.run_id.starts_with(run_ref))
        .collect();

    match matches.len() {
        0 => Err(not_found()),
        1 => Ok(matches.remove(0)),
        _ => {
            let mut candidates: Vec<String> = matches.into_iter().map(|r| r.run_id).collect();
            candidates.sort();
            Err(StoreError::Ambiguous {
                issue_id: issue_id.to_owned(),
                run_ref: run_ref.to_owned(),
                candidates,
            })
        }
    }
}

//! JSON-file run store.
//!
//! Layout: `<vault>/runs/<issue_id>/<run_id>.json`, one record per file.
//! Writes go to a temporary sibling and are renamed into place so readers
//! never see a half-written record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::models::Run;
use crate::store::{RunStore, StoreError};

/// A [`RunStore`] backed by JSON files under a vault directory.
#[derive(Debug, Clone)]
pub struct FileRunStore {
    vault: PathBuf,
}

impl FileRunStore {
    pub fn new(vault: impl Into<PathBuf>) -> Self {
        Self {
            vault: vault.into(),
        }
    }

    pub fn vault(&self) -> &Path {
        &self.vault
    }

    fn issue_dir(&self, issue_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.vault.join("runs").join(checked_id(issue_id)?))
    }

    /// Path of the record for one run. Ids that would leave the vault are
    /// rejected.
    pub fn run_path(&self, issue_id: &str, run_id: &str) -> Result<PathBuf, StoreError> {
        let run_id = checked_id(run_id)?;
        Ok(self.issue_dir(issue_id)?.join(format!("{run_id}.json")))
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    fn record_path(&self, issue_id: &str, run_id: &str) -> Option<PathBuf> {
        self.run_path(issue_id, run_id).ok()
    }

    async fn get_run(&self, issue_id: &str, run_id: &str) -> Result<Run, StoreError> {
        let path = self.run_path(issue_id, run_id)?;
        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    issue_id: issue_id.to_owned(),
                    run_ref: run_id.to_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&contents)?)
    }

    async fn list_runs(&self, issue_id: &str) -> Result<Vec<Run>, StoreError> {
        let dir = self.issue_dir(issue_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut runs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Run>(&contents) {
                Ok(run) => runs.push(run),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable run record");
                }
            }
        }
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(runs)
    }

    async fn save_run(&self, run: &Run) -> Result<(), StoreError> {
        let path = self.run_path(&run.issue_id, &run.run_id)?;
        tokio::fs::create_dir_all(self.issue_dir(&run.issue_id)?).await?;

        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(run)?;
        tokio::fs::write(&tmp, &contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// An id usable as a single path component.
fn checked_id(id: &str) -> Result<&str, StoreError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0']);
    if valid {
        Ok(id)
    } else {
        Err(StoreError::InvalidId { id: id.to_owned() })
    }
}

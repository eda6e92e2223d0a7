use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::Run;
use crate::store::{RunStore, StoreError};

/// A [`RunStore`] kept entirely in memory.
///
/// Used by tests and by callers that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<BTreeMap<(String, String), Run>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `runs`.
    pub fn with_runs(runs: impl IntoIterator<Item = Run>) -> Self {
        let map = runs
            .into_iter()
            .map(|r| ((r.issue_id.clone(), r.run_id.clone()), r))
            .collect();
        Self {
            runs: RwLock::new(map),
        }
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn get_run(&self, issue_id: &str, run_id: &str) -> Result<Run, StoreError> {
        let runs = self.runs.read().await;
        runs.get(&(issue_id.to_owned(), run_id.to_owned()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                issue_id: issue_id.to_owned(),
                run_ref: run_id.to_owned(),
            })
    }

    async fn list_runs(&self, issue_id: &str) -> Result<Vec<Run>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs
            .values()
            .filter(|r| r.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn save_run(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        runs.insert((run.issue_id.clone(), run.run_id.clone()), run.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentType, RunStatus};

    #[tokio::test]
    async fn save_then_get() {
        let store = MemoryRunStore::new();
        let run = Run::new("issue", "run-1", AgentType::Gemini);
        store.save_run(&run).await.unwrap();

        let loaded = store.get_run("issue", "run-1").await.unwrap();
        assert_eq!(loaded, run);
    }

    #[tokio::test]
    async fn resolve_by_prefix_and_update_status() {
        let store = MemoryRunStore::with_runs([
            Run::new("issue", "a1b2c3d4e5", AgentType::Claude),
            Run::new("other", "a1ffffffff", AgentType::Claude),
        ]);

        let run = store.resolve_run("issue", "a1").await.unwrap();
        assert_eq!(run.run_id, "a1b2c3d4e5");

        let updated = store
            .update_status("issue", "a1b2c3d4e5", RunStatus::Blocked)
            .await
            .unwrap();
        assert_eq!(updated.status, RunStatus::Blocked);
        assert_eq!(
            store.get_run("issue", "a1b2c3d4e5").await.unwrap().status,
            RunStatus::Blocked
        );
    }

    #[tokio::test]
    async fn missing_run_is_not_found() {
        let store = MemoryRunStore::new();
        let err = store.get_run("issue", "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}

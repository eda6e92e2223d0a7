//! One polling cycle over a run, and a poller over all runs of an issue.

use std::collections::HashMap;
use std::sync::Arc;

use orch_store::{Run, RunStatus, RunStore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{Backend, BackendFactory};
use crate::error::Result;
use crate::status::RunState;

/// Run one polling cycle and return the derived status, or `None` to keep
/// the current one.
///
/// Terminal runs are skipped. Liveness is checked before anything else: a
/// dead backend is `done` if a completion was recorded, otherwise
/// `unknown`. A run still starting may not be reachable yet, so it gets the
/// backend's starting status instead.
pub async fn poll_run(
    backend: &Backend,
    run: &Run,
    state: &mut RunState,
    cancel: &CancellationToken,
) -> Option<RunStatus> {
    if run.status.is_terminal() {
        return None;
    }

    if !backend.is_alive(run, cancel).await {
        if run.status.is_starting() {
            return backend.starting_status();
        }
        return Some(if state.completion_recorded {
            RunStatus::Done
        } else {
            RunStatus::Unknown
        });
    }

    let text = match backend.capture_output(run, cancel).await {
        Ok(text) => text,
        Err(e) => {
            debug!(issue_id = %run.issue_id, run_id = %run.run_id, error = %e, "capture failed");
            return None;
        }
    };

    let changed = state.observe(&text);
    let has_prompt = backend.detect_prompt(&text);
    let status = backend
        .get_status(run, &text, state, changed, has_prompt, cancel)
        .await;

    if status == Some(RunStatus::Done) {
        state.record_completion();
    }
    debug!(
        issue_id = %run.issue_id,
        run_id = %run.run_id,
        changed,
        has_prompt,
        status = ?status,
        "polled run"
    );
    status
}

/// Polls runs and writes changed statuses back to the store.
///
/// Keeps one [`RunState`] per run for as long as the poller lives.
pub struct Poller {
    store: Arc<dyn RunStore>,
    backends: BackendFactory,
    states: HashMap<(String, String), RunState>,
}

impl Poller {
    pub fn new(store: Arc<dyn RunStore>, backends: BackendFactory) -> Self {
        Self {
            store,
            backends,
            states: HashMap::new(),
        }
    }

    /// Poll every run of `issue_id` once. Returns the runs as they stand
    /// after the cycle.
    pub async fn poll_issue(&mut self, issue_id: &str, cancel: &CancellationToken) -> Result<Vec<Run>> {
        let runs = self.store.list_runs(issue_id).await?;
        let mut updated = Vec::with_capacity(runs.len());
        for run in runs {
            updated.push(self.poll_one(run, cancel).await?);
        }
        Ok(updated)
    }

    /// Poll a single run and persist its status if it changed.
    pub async fn poll_one(&mut self, run: Run, cancel: &CancellationToken) -> Result<Run> {
        let backend = self.backends.for_run(&run);
        let state = self
            .states
            .entry((run.issue_id.clone(), run.run_id.clone()))
            .or_default();

        match poll_run(&backend, &run, state, cancel).await {
            Some(status) if status != run.status => Ok(self
                .store
                .update_status(&run.issue_id, &run.run_id, status)
                .await?),
            _ => Ok(run),
        }
    }
}

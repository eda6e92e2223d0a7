//! `orch status` command: poll every run of an issue and print its status.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use orch_core::poll::Poller;
use orch_store::{FileRunStore, Run, RunStatus};

use crate::config::OrchConfig;

/// Run the status command. With `watch`, repeat at the configured poll
/// interval until cancelled.
pub async fn run_status(
    config: &OrchConfig,
    issue_id: &str,
    watch: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let store = Arc::new(FileRunStore::new(&config.vault));
    let mut poller = Poller::new(store, config.backend_factory());

    loop {
        let runs = poller
            .poll_issue(issue_id, cancel)
            .await
            .with_context(|| format!("failed to poll runs for {issue_id}"))?;
        print!("{}", render_runs(issue_id, &runs));

        if !watch {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(config.poll_interval) => println!(),
        }
    }
}

/// Format the run table for one issue.
pub fn render_runs(issue_id: &str, runs: &[Run]) -> String {
    if runs.is_empty() {
        return format!("No runs for {issue_id}.\n");
    }

    let mut runs: Vec<&Run> = runs.iter().collect();
    runs.sort_by_key(|r| r.started_at);

    let mut out = format!("Runs for {issue_id}:\n");
    for run in runs {
        let handle = match (&run.tmux_session, run.server_port, &run.session_id) {
            (_, Some(port), Some(session)) => format!("port {port} session {session}"),
            (Some(tmux), _, _) => tmux.clone(),
            _ => "-".to_string(),
        };
        out.push_str(&format!(
            "  [{}] {} {:<8} {:<11} {} (updated {})\n",
            status_icon(run.status),
            run.short_id(),
            run.agent.to_string(),
            run.status.to_string(),
            handle,
            run.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    out
}

fn status_icon(status: RunStatus) -> char {
    match status {
        RunStatus::Queued => '.',
        RunStatus::Booting => '>',
        RunStatus::Running => '*',
        RunStatus::Blocked => '?',
        RunStatus::BlockedApi => '~',
        RunStatus::Done => '+',
        RunStatus::Failed => '!',
        RunStatus::Unknown => ' ',
    }
}

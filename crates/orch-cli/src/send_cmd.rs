//! `orch send` command: deliver a follow-up message to a live run.
//!
//! Goes through the vault's daemon when one is running, otherwise sends
//! in-process.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use orch_core::backend::{BackendFactory, SendOptions};
use orch_store::{FileRunStore, RunStore};

use crate::config::OrchConfig;

/// Run the send command.
pub async fn run_send(
    config: &OrchConfig,
    issue_id: &str,
    run_ref: &str,
    message: &str,
    no_enter: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    #[cfg(unix)]
    {
        use orch_core::daemon::{DaemonClient, DaemonPaths, SendRequest};

        let client = DaemonClient::new(DaemonPaths::for_vault(&config.vault));
        if client.is_running() {
            let mut request = SendRequest::new(issue_id, run_ref, message);
            request.no_enter = no_enter;
            client.send(request).await.context("daemon send failed")?;
            println!("Sent to {issue_id}/{run_ref} via daemon.");
            return Ok(());
        }
    }

    let store = FileRunStore::new(&config.vault);
    let run_id = send_in_process(
        &store,
        &config.backend_factory(),
        issue_id,
        run_ref,
        message,
        no_enter,
        cancel,
    )
    .await?;
    println!("Sent to {issue_id}/{run_id}.");
    Ok(())
}

/// Resolve the run and send through its backend directly. Returns the full
/// run id.
pub async fn send_in_process(
    store: &dyn RunStore,
    backends: &BackendFactory,
    issue_id: &str,
    run_ref: &str,
    message: &str,
    no_enter: bool,
    cancel: &CancellationToken,
) -> Result<String> {
    let run = store
        .resolve_run(issue_id, run_ref)
        .await
        .with_context(|| format!("cannot resolve run {run_ref} of {issue_id}"))?;
    let options = SendOptions {
        no_enter,
        ..SendOptions::default()
    };
    backends
        .for_run(&run)
        .send_message(&run, message, &options, cancel)
        .await
        .with_context(|| format!("failed to send to run {}", run.short_id()))?;
    Ok(run.run_id)
}

#[cfg(test)]
mod tests {
    use orch_core::exec::CommandOutput;
    use orch_store::{AgentType, MemoryRunStore, Run, RunStatus};
    use orch_test_utils::FakeRunner;

    use super::*;

    fn store() -> MemoryRunStore {
        let mut run = Run::new("issue-5", "0123456789ab", AgentType::Codex);
        run.status = RunStatus::Blocked;
        run.tmux_session = Some("orch-issue-5-0123456789ab".into());
        MemoryRunStore::with_runs([run])
    }

    #[tokio::test]
    async fn prefix_resolves_and_types_message() {
        let runner = FakeRunner::new();
        let run_id = send_in_process(
            &store(),
            &BackendFactory::new(runner.clone()),
            "issue-5",
            "0123",
            "please continue",
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(run_id, "0123456789ab");
        let sends = runner.calls_to("send-keys");
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].args.last().unwrap(), "please continue");
        assert_eq!(sends[1].args.last().unwrap(), "Enter");
    }

    #[tokio::test]
    async fn unknown_run_names_the_reference() {
        let err = send_in_process(
            &store(),
            &BackendFactory::new(FakeRunner::new()),
            "issue-5",
            "zzz",
            "hi",
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("cannot resolve run zzz"), "{err}");
    }

    #[tokio::test]
    async fn vanished_session_is_reported() {
        let runner = FakeRunner::new();
        runner.respond(&["has-session"], CommandOutput::failed(1, "can't find session"));
        let err = send_in_process(
            &store(),
            &BackendFactory::new(runner.clone()),
            "issue-5",
            "0123456789ab",
            "hi",
            true,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("failed to send to run 01234567"), "{err:#}");
        assert!(runner.calls_to("send-keys").is_empty());
    }
}

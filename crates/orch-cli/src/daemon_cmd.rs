//! `orch daemon` command: serve send requests for the vault until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use orch_core::daemon::{DaemonPaths, DaemonServer};
use orch_store::FileRunStore;

use crate::config::OrchConfig;

/// Run the daemon in the foreground.
pub async fn run_daemon(config: &OrchConfig, cancel: CancellationToken) -> Result<()> {
    let paths = DaemonPaths::for_vault(&config.vault);
    let store = Arc::new(FileRunStore::new(&config.vault));
    let server = DaemonServer::new(paths.clone(), store, config.backend_factory());

    let listener = server
        .bind()
        .await
        .with_context(|| format!("cannot listen on {}", paths.socket.display()))?;
    println!("orch daemon listening on {}", paths.socket.display());

    server.serve(listener, cancel).await.context("daemon stopped with an error")?;
    println!("orch daemon stopped.");
    Ok(())
}

//! `orch launch` command: start an agent for an issue and record the run.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use orch_core::agent::{AdapterRegistry, LaunchConfig};
use orch_core::exec::SystemRunner;
use orch_core::launcher::Launcher;
use orch_store::{AgentType, FileRunStore, Run, RunStatus, RunStore};

use crate::config::OrchConfig;

/// How many ports above `headless.base_port` are tried before giving up.
const PORT_SCAN_LIMIT: u16 = 100;

#[derive(Debug, Args)]
pub struct LaunchArgs {
    /// Issue the run works on
    pub issue: String,
    /// Initial instruction for the agent
    pub prompt: String,
    /// Agent to start (claude, codex, gemini, opencode, custom)
    #[arg(long)]
    pub agent: Option<AgentType>,
    /// Model name (opencode expects provider/model)
    #[arg(long)]
    pub model: Option<String>,
    /// Model variant or reasoning effort
    #[arg(long)]
    pub variant: Option<String>,
    /// Continue the agent's previous conversation
    #[arg(long)]
    pub resume: bool,
    /// Port for the headless server (default: first free port from headless.base_port)
    #[arg(long)]
    pub port: Option<u16>,
    /// Shell command for the custom agent
    #[arg(long = "command")]
    pub custom_command: Option<String>,
    /// Working directory for the agent (default: current directory)
    #[arg(long)]
    pub workdir: Option<PathBuf>,
    /// Git branch the run works on
    #[arg(long)]
    pub branch: Option<String>,
}

/// Run the launch command against the vault's run store.
pub async fn run_launch(config: &OrchConfig, args: LaunchArgs, cancel: &CancellationToken) -> Result<()> {
    let store = FileRunStore::new(&config.vault);
    let launcher = Launcher::new(Arc::new(AdapterRegistry::with_defaults()), SystemRunner::shared())
        .with_headless_host(config.headless_host.clone());

    let run = launch_run(config, &store, &launcher, args, cancel).await?;

    println!(
        "Launched run {} for {} ({})",
        run.short_id(),
        run.issue_id,
        run.agent
    );
    if let Some(session) = &run.tmux_session {
        println!("  tmux session: {session}");
    }
    if let (Some(port), Some(session)) = (run.server_port, &run.session_id) {
        println!("  headless server: {}:{port} session {session}", config.headless_host);
    }
    Ok(())
}

/// Record a booting run, start the agent, and store the outcome.
///
/// A failed launch leaves the run recorded as `failed`.
pub async fn launch_run(
    config: &OrchConfig,
    store: &dyn RunStore,
    launcher: &Launcher,
    args: LaunchArgs,
    cancel: &CancellationToken,
) -> Result<Run> {
    let agent = args.agent.unwrap_or(config.default_agent);
    let working_dir = match args.workdir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };
    let port = match (agent.is_headless(), args.port) {
        (_, Some(port)) => Some(port),
        (true, None) => Some(pick_port(&config.headless_host, config.base_port)?),
        (false, None) => None,
    };

    let run_id = Uuid::new_v4().simple().to_string();
    let mut run = Run::new(&args.issue, &run_id, agent);
    run.worktree_path = Some(working_dir.clone());
    run.branch = args.branch.clone();
    run.set_status(RunStatus::Booting);
    store.save_run(&run).await.context("failed to record run")?;

    let mut launch = LaunchConfig::new(working_dir, &args.issue, &run_id);
    launch.run_path = store.record_path(&args.issue, &run_id);
    launch.vault = Some(config.vault.clone());
    launch.branch = args.branch;
    launch.model = args.model.or_else(|| config.model.clone());
    launch.variant = args.variant.or_else(|| config.variant.clone());
    launch.resume = args.resume;
    launch.port = port;
    launch.custom_command = args.custom_command;
    launch.prompt = args.prompt;

    match launcher.launch(agent, &launch, cancel).await {
        Ok(outcome) => {
            run.tmux_session = Some(outcome.tmux_session);
            run.server_port = outcome.port;
            run.session_id = outcome.session_id;
            run.set_status(RunStatus::Running);
            store.save_run(&run).await.context("failed to record launch")?;
            Ok(run)
        }
        Err(e) => {
            run.set_status(RunStatus::Failed);
            if let Err(save_err) = store.save_run(&run).await {
                tracing::warn!(run_id = %run.run_id, error = %save_err, "failed to record launch failure");
            }
            Err(e).with_context(|| format!("failed to launch {agent} for {}", run.issue_id))
        }
    }
}

/// First port at or above `base` that `host` can bind.
fn pick_port(host: &str, base: u16) -> Result<u16> {
    (base..=u16::MAX)
        .take(usize::from(PORT_SCAN_LIMIT))
        .find(|port| TcpListener::bind((host, *port)).is_ok())
        .with_context(|| format!("no free port on {host} starting at {base}"))
}

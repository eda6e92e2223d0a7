mod config;
#[cfg(unix)]
mod daemon_cmd;
mod launch_cmd;
mod send_cmd;
mod status_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use orch_core::agent::{AdapterRegistry, PromptInjection};

use config::OrchConfig;

#[derive(Parser)]
#[command(name = "orch", about = "Supervisor for long-running AI coding-agent sessions")]
struct Cli {
    /// Vault directory holding run records and the daemon socket (overrides ORCH_VAULT)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default orch config file
    Init {
        /// Vault directory to record in the config file
        #[arg(long = "vault-path")]
        vault_path: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// List known agents and whether their executables are installed
    Agents,
    /// Start an agent for an issue
    Launch(launch_cmd::LaunchArgs),
    /// Show the status of every run of an issue
    Status {
        /// Issue to inspect
        issue: String,
        /// Keep polling at the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Send a follow-up message to a running agent
    Send {
        /// Issue the run belongs to
        issue: String,
        /// Run id or unique prefix
        run: String,
        /// Message text
        message: String,
        /// Type the message without pressing Enter
        #[arg(long)]
        no_enter: bool,
    },
    /// Run the IPC daemon for the vault in the foreground
    Daemon,
}

/// Execute the `orch init` command: write config file.
fn cmd_init(vault_path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::ConfigFile::default();
    cfg.vault.path = vault_path;
    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    match &cfg.vault.path {
        Some(vault) => println!("  vault.path = {}", vault.display()),
        None => println!("  vault.path unset; the current directory is used"),
    }
    println!("  agent.default = {}", cfg.agent.default);
    println!("  headless.base_port = {}", cfg.headless.base_port);
    Ok(())
}

/// Execute the `orch agents` command.
fn cmd_agents() {
    print!("{}", render_agents(&AdapterRegistry::with_defaults()));
}

fn render_agents(registry: &AdapterRegistry) -> String {
    let mut out = String::new();
    for agent in registry.list() {
        let Ok(adapter) = registry.get(agent) else {
            continue;
        };
        let injection = match adapter.prompt_injection() {
            PromptInjection::InlineArgument => "inline",
            PromptInjection::TerminalKeystrokes => "keystrokes",
            PromptInjection::HttpAfterStart => "http",
        };
        let available = if adapter.is_available() { "available" } else { "missing" };
        out.push_str(&format!(
            "{:<9} {:<10} {:<10} {}\n",
            agent.to_string(),
            injection,
            available,
            adapter.executable()
        ));
    }
    out
}

/// Token cancelled on Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        trigger.cancel();
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { vault_path, force } => {
            cmd_init(vault_path, force)?;
        }
        Commands::Agents => {
            cmd_agents();
        }
        Commands::Launch(args) => {
            let resolved = OrchConfig::resolve(cli.vault.as_deref())?;
            launch_cmd::run_launch(&resolved, args, &ctrl_c_token()).await?;
        }
        Commands::Status { issue, watch } => {
            let resolved = OrchConfig::resolve(cli.vault.as_deref())?;
            status_cmd::run_status(&resolved, &issue, watch, &ctrl_c_token()).await?;
        }
        Commands::Send {
            issue,
            run,
            message,
            no_enter,
        } => {
            let resolved = OrchConfig::resolve(cli.vault.as_deref())?;
            send_cmd::run_send(&resolved, &issue, &run, &message, no_enter, &ctrl_c_token())
                .await?;
        }
        #[cfg(unix)]
        Commands::Daemon => {
            let resolved = OrchConfig::resolve(cli.vault.as_deref())?;
            daemon_cmd::run_daemon(&resolved, ctrl_c_token()).await?;
        }
        #[cfg(not(unix))]
        Commands::Daemon => {
            anyhow::bail!("the orch daemon needs Unix domain sockets");
        }
    }

    Ok(())
}

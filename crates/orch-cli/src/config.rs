//! Configuration file management for orch.
//!
//! Provides a TOML-based config file at `~/.config/orch/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use orch_core::agent::opencode::HEADLESS_HOST;
use orch_core::backend::{BackendFactory, DEFAULT_CAPTURE_LINES};
use orch_core::exec::SystemRunner;
use orch_store::AgentType;

/// Environment variable naming the vault directory.
pub const VAULT_ENV: &str = "ORCH_VAULT";

pub const DEFAULT_BASE_PORT: u16 = 4096;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub vault: VaultSection,
    pub agent: AgentSection,
    pub tmux: TmuxSection,
    pub headless: HeadlessSection,
    pub poll: PollSection,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Agent used when `orch launch` is not given one.
    pub default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            default: AgentType::Claude.to_string(),
            model: None,
            variant: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmuxSection {
    pub capture_lines: usize,
}

impl Default for TmuxSection {
    fn default() -> Self {
        Self {
            capture_lines: DEFAULT_CAPTURE_LINES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessSection {
    pub host: String,
    /// First port tried when a headless agent is launched without `--port`.
    pub base_port: u16,
}

impl Default for HeadlessSection {
    fn default() -> Self {
        Self {
            host: HEADLESS_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    pub interval_secs: u64,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the orch config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/orch` or `~/.config/orch`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("orch");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("orch")
}

/// Return the path to the orch config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file if one exists. A missing file is not an error; a
/// malformed one is.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchConfig {
    pub vault: PathBuf,
    pub default_agent: AgentType,
    pub model: Option<String>,
    pub variant: Option<String>,
    pub capture_lines: usize,
    pub headless_host: String,
    pub base_port: u16,
    pub poll_interval: Duration,
}

impl OrchConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Vault: `cli_vault` > `ORCH_VAULT` env > `vault.path` > current directory
    /// - Everything else: config file > built-in default
    pub fn resolve(cli_vault: Option<&Path>) -> Result<Self> {
        let file = load_config()?;
        let env_vault = std::env::var(VAULT_ENV).ok().filter(|v| !v.is_empty());
        Self::resolve_with(file.unwrap_or_default(), cli_vault, env_vault)
    }

    /// The resolution chain over explicit inputs.
    pub fn resolve_with(
        file: ConfigFile,
        cli_vault: Option<&Path>,
        env_vault: Option<String>,
    ) -> Result<Self> {
        let vault = if let Some(path) = cli_vault {
            path.to_path_buf()
        } else if let Some(path) = env_vault {
            PathBuf::from(path)
        } else if let Some(path) = file.vault.path {
            path
        } else {
            std::env::current_dir().context("failed to determine current directory")?
        };

        let default_agent = file
            .agent
            .default
            .parse::<AgentType>()
            .context("invalid agent.default in config file")?;

        Ok(Self {
            vault,
            default_agent,
            model: file.agent.model.filter(|m| !m.trim().is_empty()),
            variant: file.agent.variant.filter(|v| !v.trim().is_empty()),
            capture_lines: file.tmux.capture_lines.max(1),
            headless_host: file.headless.host,
            base_port: file.headless.base_port,
            poll_interval: Duration::from_secs(file.poll.interval_secs.max(1)),
        })
    }

    /// Backend factory over real subprocesses, tuned by this configuration.
    pub fn backend_factory(&self) -> BackendFactory {
        BackendFactory::new(SystemRunner::shared())
            .with_capture_lines(self.capture_lines)
            .with_headless_host(self.headless_host.clone())
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

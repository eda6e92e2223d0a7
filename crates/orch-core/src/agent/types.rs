//! Value types describing one agent launch.

use std::path::PathBuf;

use orch_store::AgentType;

/// How the initial prompt reaches a freshly started agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptInjection {
    /// The prompt is part of the launch command line.
    InlineArgument,
    /// The prompt is typed into the terminal once the agent is ready.
    TerminalKeystrokes,
    /// The prompt is sent over HTTP after the headless server is up.
    HttpAfterStart,
}

/// Permission policy exported to the headless agent so it runs unattended.
pub const HEADLESS_PERMISSION_POLICY: &str = r#"{"*":"allow"}"#;

/// Everything needed to start one agent instance.
///
/// Built once per launch and never mutated after the process starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchConfig {
    pub working_dir: PathBuf,
    pub issue_id: String,
    pub run_id: String,
    /// Path of the run record, exported to the agent.
    pub run_path: Option<PathBuf>,
    /// Vault/workspace root, exported to the agent.
    pub vault: Option<PathBuf>,
    pub branch: Option<String>,
    pub model: Option<String>,
    /// Model variant / reasoning effort.
    pub variant: Option<String>,
    /// Continue the agent's previous conversation instead of starting fresh.
    pub resume: bool,
    /// Port for the headless server.
    pub port: Option<u16>,
    /// Shell command for the custom agent type.
    pub custom_command: Option<String>,
    /// Initial instruction for the agent.
    pub prompt: String,
}

impl LaunchConfig {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        issue_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            issue_id: issue_id.into(),
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// Model name, treating an empty string as unset.
    pub fn model(&self) -> Option<&str> {
        non_empty(self.model.as_deref())
    }

    /// Model variant, treating an empty string as unset.
    pub fn variant(&self) -> Option<&str> {
        non_empty(self.variant.as_deref())
    }

    /// Custom command, treating a blank string as unset.
    pub fn custom_command(&self) -> Option<&str> {
        self.custom_command
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Environment variables exported to the launched agent.
    pub fn environment(&self, agent: AgentType) -> Vec<(String, String)> {
        let mut env = vec![
            ("ORCH_ISSUE_ID".to_string(), self.issue_id.clone()),
            ("ORCH_RUN_ID".to_string(), self.run_id.clone()),
            (
                "ORCH_WORKTREE_PATH".to_string(),
                self.working_dir.display().to_string(),
            ),
        ];
        if let Some(path) = &self.run_path {
            env.push(("ORCH_RUN_PATH".to_string(), path.display().to_string()));
        }
        if let Some(branch) = &self.branch {
            env.push(("ORCH_BRANCH".to_string(), branch.clone()));
        }
        if let Some(vault) = &self.vault {
            env.push(("ORCH_VAULT".to_string(), vault.display().to_string()));
        }
        if agent.is_headless() {
            env.push((
                "OPENCODE_PERMISSION".to_string(),
                HEADLESS_PERMISSION_POLICY.to_string(),
            ));
        }
        env
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

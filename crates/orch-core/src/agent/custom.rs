//! Adapter for user-supplied agent commands.

use orch_store::AgentType;

use super::shell::quote;
use super::trait_def::AgentAdapter;
use super::types::{LaunchConfig, PromptInjection};
use crate::error::{Error, Result};

/// Runs `LaunchConfig::custom_command` through `sh -c`.
///
/// The command is quoted as a single argument so it reaches `sh` intact no
/// matter how tmux re-parses the outer line. The prompt is typed in
/// afterwards since nothing is known about the command's argument syntax.
#[derive(Debug, Clone, Default)]
pub struct CustomAdapter;

impl CustomAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl AgentAdapter for CustomAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Custom
    }

    fn executable(&self) -> &str {
        "sh"
    }

    fn build_launch_command(&self, config: &LaunchConfig) -> Result<String> {
        let command = config
            .custom_command()
            .ok_or_else(|| Error::Config("custom agent requires a command".into()))?;
        Ok(format!("sh -c {}", quote(command)))
    }

    fn prompt_injection(&self) -> PromptInjection {
        PromptInjection::TerminalKeystrokes
    }
}

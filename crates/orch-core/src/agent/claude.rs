//! Claude Code adapter.
//!
//! Starts the interactive `claude` TUI with permissions pre-approved and the
//! prompt as the trailing positional argument.

use orch_store::AgentType;

use super::shell::{quote, quote_arg};
use super::trait_def::AgentAdapter;
use super::types::{LaunchConfig, PromptInjection};
use crate::error::Result;

/// Adapter for [Claude Code](https://docs.anthropic.com/en/docs/claude-code).
#[derive(Debug, Clone)]
pub struct ClaudeAdapter {
    binary: String,
}

impl ClaudeAdapter {
    /// Create an adapter that looks for `claude` on `$PATH`.
    pub fn new() -> Self {
        Self::with_binary("claude")
    }

    /// Create an adapter using a custom binary path.
    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentAdapter for ClaudeAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Claude
    }

    fn executable(&self) -> &str {
        &self.binary
    }

    fn build_launch_command(&self, config: &LaunchConfig) -> Result<String> {
        let mut parts = vec![
            quote_arg(&self.binary),
            "--dangerously-skip-permissions".to_string(),
        ];
        if let Some(model) = config.model() {
            parts.push("--model".to_string());
            parts.push(quote_arg(model));
        }
        if config.resume {
            parts.push("--continue".to_string());
        }
        if !config.prompt.is_empty() {
            parts.push(quote(&config.prompt));
        }
        Ok(parts.join(" "))
    }

    fn prompt_injection(&self) -> PromptInjection {
        PromptInjection::InlineArgument
    }
}

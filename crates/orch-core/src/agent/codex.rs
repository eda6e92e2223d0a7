//! Codex CLI adapter.

use orch_store::AgentType;

use super::shell::{quote, quote_arg};
use super::trait_def::AgentAdapter;
use super::types::{LaunchConfig, PromptInjection};
use crate::error::Result;

/// Adapter for the `codex` CLI.
///
/// The model variant maps to codex's reasoning-effort config override.
#[derive(Debug, Clone)]
pub struct CodexAdapter {
    binary: String,
}

impl CodexAdapter {
    pub fn new() -> Self {
        Self::with_binary("codex")
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentAdapter for CodexAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Codex
    }

    fn executable(&self) -> &str {
        &self.binary
    }

    fn build_launch_command(&self, config: &LaunchConfig) -> Result<String> {
        let mut parts = vec![quote_arg(&self.binary)];
        if config.resume {
            parts.push("resume".to_string());
            parts.push("--last".to_string());
        }
        parts.push("--dangerously-bypass-approvals-and-sandbox".to_string());
        if let Some(model) = config.model() {
            parts.push("--model".to_string());
            parts.push(quote_arg(model));
        }
        if let Some(variant) = config.variant() {
            parts.push("-c".to_string());
            parts.push(quote_arg(&format!("model_reasoning_effort={variant}")));
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

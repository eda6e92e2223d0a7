//! Gemini CLI adapter.
//!
//! The gemini TUI does not take a prompt argument in interactive mode, so
//! the prompt is typed in once the input box is drawn.

use orch_store::AgentType;

use super::shell::quote_arg;
use super::trait_def::AgentAdapter;
use super::types::{LaunchConfig, PromptInjection};
use crate::error::Result;

/// Text shown in the gemini input box once it accepts keystrokes.
pub const GEMINI_READY_PATTERN: &str = "Type your message";

#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    binary: String,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self::with_binary("gemini")
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentAdapter for GeminiAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Gemini
    }

    fn executable(&self) -> &str {
        &self.binary
    }

    fn build_launch_command(&self, config: &LaunchConfig) -> Result<String> {
        let mut parts = vec![quote_arg(&self.binary), "--yolo".to_string()];
        if let Some(model) = config.model() {
            parts.push("--model".to_string());
            parts.push(quote_arg(model));
        }
        if config.resume {
            parts.push("--resume".to_string());
            parts.push("latest".to_string());
        }
        Ok(parts.join(" "))
    }

    fn prompt_injection(&self) -> PromptInjection {
        PromptInjection::TerminalKeystrokes
    }

    fn ready_pattern(&self) -> &str {
        GEMINI_READY_PATTERN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_not_in_command() {
        let mut c = LaunchConfig::new("/work", "issue-1", "run-1");
        c.prompt = "do things".into();
        c.model = Some("gemini-2.5-pro".into());
        let cmd = GeminiAdapter::new().build_launch_command(&c).unwrap();
        assert_eq!(cmd, "gemini --yolo --model gemini-2.5-pro");
    }

    #[test]
    fn waits_for_input_box() {
        let adapter = GeminiAdapter::new();
        assert_eq!(adapter.prompt_injection(), PromptInjection::TerminalKeystrokes);
        assert_eq!(adapter.ready_pattern(), GEMINI_READY_PATTERN);
    }
}

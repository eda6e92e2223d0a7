//! opencode adapter: the headless HTTP-served backend.
//!
//! The process started in the terminal is only the server; the prompt goes
//! through the [`crate::headless::HeadlessClient`] once the server answers
//! its health check.

use orch_store::AgentType;

use super::shell::quote_arg;
use super::trait_def::AgentAdapter;
use super::types::{LaunchConfig, PromptInjection};
use crate::error::{Error, Result};

/// Interface the headless server binds to.
pub const HEADLESS_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone)]
pub struct OpencodeAdapter {
    binary: String,
}

impl OpencodeAdapter {
    pub fn new() -> Self {
        Self::with_binary("opencode")
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for OpencodeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentAdapter for OpencodeAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::Opencode
    }

    fn executable(&self) -> &str {
        &self.binary
    }

    fn build_launch_command(&self, config: &LaunchConfig) -> Result<String> {
        let port = config
            .port
            .ok_or_else(|| Error::Config("opencode launch requires a server port".into()))?;
        Ok(format!(
            "{} serve --hostname {HEADLESS_HOST} --port {port}",
            quote_arg(&self.binary)
        ))
    }

    fn prompt_injection(&self) -> PromptInjection {
        PromptInjection::HttpAfterStart
    }
}

//! Backend session managers.
//!
//! A run is supervised through exactly one backend, chosen from its
//! [`AgentType`] by [`BackendKind::for_agent`]:
//!
//! ```text
//! claude | codex | gemini | custom  -> Terminal (tmux session)
//! opencode                          -> Api      (headless HTTP server)
//! ```
//!
//! Both variants expose the same operations through [`Backend`]: liveness,
//! output capture, prompt detection, status derivation and message
//! injection.

pub mod api;
pub mod terminal;
pub mod tmux;

use std::sync::Arc;

use orch_store::{AgentType, Run, RunStatus};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::exec::CommandRunner;
use crate::status::RunState;

pub use api::ApiBackend;
pub use terminal::{DEFAULT_CAPTURE_LINES, TerminalBackend};
pub use tmux::{Tmux, session_name};

/// Which kind of backend supervises an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Terminal,
    Api,
}

impl BackendKind {
    pub fn for_agent(agent: AgentType) -> Self {
        match agent {
            AgentType::Claude | AgentType::Codex | AgentType::Gemini | AgentType::Custom => {
                Self::Terminal
            }
            AgentType::Opencode => Self::Api,
        }
    }
}

/// Per-message delivery options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Type the text without pressing Enter (terminal backend only).
    pub no_enter: bool,
    /// `provider/model` override (API backend only).
    pub model: Option<String>,
    pub variant: Option<String>,
    pub agent: Option<String>,
}

/// A backend session manager.
#[derive(Debug, Clone)]
pub enum Backend {
    Terminal(TerminalBackend),
    Api(ApiBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Terminal(_) => BackendKind::Terminal,
            Self::Api(_) => BackendKind::Api,
        }
    }

    pub async fn is_alive(&self, run: &Run, cancel: &CancellationToken) -> bool {
        match self {
            Self::Terminal(b) => b.is_alive(run).await,
            Self::Api(b) => b.is_alive(run, cancel).await,
        }
    }

    pub async fn capture_output(&self, run: &Run, cancel: &CancellationToken) -> Result<String> {
        match self {
            Self::Terminal(b) => b.capture_output(run).await,
            Self::Api(b) => b.capture_output(run, cancel).await,
        }
    }

    /// Status for a starting run whose backend is not reachable yet.
    ///
    /// A headless server may not know the remote session yet, so API runs
    /// report `running`. Terminal runs keep their current status.
    pub fn starting_status(&self) -> Option<RunStatus> {
        match self {
            Self::Terminal(_) => None,
            Self::Api(_) => Some(RunStatus::Running),
        }
    }

    pub fn detect_prompt(&self, text: &str) -> bool {
        match self {
            Self::Terminal(b) => b.detect_prompt(text),
            Self::Api(b) => b.detect_prompt(text),
        }
    }

    /// Derive a status, or `None` for "keep the previous one".
    pub async fn get_status(
        &self,
        run: &Run,
        text: &str,
        state: &RunState,
        output_changed: bool,
        has_prompt: bool,
        cancel: &CancellationToken,
    ) -> Option<RunStatus> {
        match self {
            Self::Terminal(b) => b.get_status(text, state, output_changed, has_prompt),
            Self::Api(b) => b.get_status(run, cancel).await,
        }
    }

    pub async fn send_message(
        &self,
        run: &Run,
        text: &str,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match self {
            Self::Terminal(b) => b.send_message(run, text, options).await,
            Self::Api(b) => b.send_message(run, text, options, cancel).await,
        }
    }
}

/// Builds the backend for a run.
#[derive(Debug, Clone)]
pub struct BackendFactory {
    terminal: TerminalBackend,
    api: ApiBackend,
}

impl BackendFactory {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            terminal: TerminalBackend::new(Tmux::new(runner)),
            api: ApiBackend::new(),
        }
    }

    pub fn with_capture_lines(mut self, lines: usize) -> Self {
        self.terminal = self.terminal.with_capture_lines(lines);
        self.api = self.api.with_capture_lines(lines);
        self
    }

    pub fn with_headless_host(mut self, host: impl Into<String>) -> Self {
        self.api = self.api.with_host(host);
        self
    }

    pub fn with_api_backend(mut self, api: ApiBackend) -> Self {
        self.api = api;
        self
    }

    pub fn for_agent(&self, agent: AgentType) -> Backend {
        match BackendKind::for_agent(agent) {
            BackendKind::Terminal => Backend::Terminal(self.terminal.clone()),
            BackendKind::Api => Backend::Api(self.api.clone()),
        }
    }

    pub fn for_run(&self, run: &Run) -> Backend {
        self.for_agent(run.agent)
    }
}

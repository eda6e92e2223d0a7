//! Start an agent in tmux and deliver its initial prompt.

use std::sync::Arc;
use std::time::Duration;

use orch_store::AgentType;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::opencode::HEADLESS_HOST;
use crate::agent::{AdapterRegistry, LaunchConfig, PromptInjection};
use crate::backend::{Tmux, session_name};
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use crate::headless::{HeadlessClient, MessageOptions, RetryPolicy};

/// Backend handles produced by a launch, to be recorded on the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub tmux_session: String,
    pub port: Option<u16>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Launcher {
    registry: Arc<AdapterRegistry>,
    tmux: Tmux,
    headless_host: String,
    retry: RetryPolicy,
    startup_timeout: Duration,
    poll_interval: Duration,
    capture_lines: usize,
}

impl Launcher {
    pub fn new(registry: Arc<AdapterRegistry>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            registry,
            tmux: Tmux::new(runner),
            headless_host: HEADLESS_HOST.to_string(),
            retry: RetryPolicy::default(),
            startup_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            capture_lines: 50,
        }
    }

    pub fn with_headless_host(mut self, host: impl Into<String>) -> Self {
        self.headless_host = host.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// How long to wait for a ready pattern or a healthy server, and how
    /// often to check.
    pub fn with_startup_timing(mut self, timeout: Duration, interval: Duration) -> Self {
        self.startup_timeout = timeout;
        self.poll_interval = interval;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Start `agent` for `config` and hand it the initial prompt.
    pub async fn launch(
        &self,
        agent: AgentType,
        config: &LaunchConfig,
        cancel: &CancellationToken,
    ) -> Result<LaunchOutcome> {
        let adapter = self.registry.get(agent)?;
        let command = adapter.build_launch_command(config)?;
        let session = session_name(&config.issue_id, &config.run_id);

        self.tmux
            .new_session(
                &session,
                &config.working_dir,
                &config.environment(agent),
                &command,
            )
            .await?;
        info!(
            issue_id = %config.issue_id,
            run_id = %config.run_id,
            agent = %agent,
            session = %session,
            "launched agent"
        );

        let mut outcome = LaunchOutcome {
            tmux_session: session.clone(),
            port: config.port,
            session_id: None,
        };

        match adapter.prompt_injection() {
            PromptInjection::InlineArgument => {}
            PromptInjection::TerminalKeystrokes => {
                if !config.prompt.is_empty() {
                    self.wait_for_ready(&session, adapter.ready_pattern(), cancel)
                        .await?;
                    self.tmux.send_literal(&session, &config.prompt).await?;
                    self.tmux.send_enter(&session).await?;
                }
            }
            PromptInjection::HttpAfterStart => {
                outcome.session_id = Some(self.start_remote_session(config, cancel).await?);
            }
        }

        Ok(outcome)
    }

    /// Wait for the headless server, create a session and queue the prompt.
    async fn start_remote_session(
        &self,
        config: &LaunchConfig,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let port = config
            .port
            .ok_or_else(|| Error::Config("headless launch requires a server port".into()))?;
        let client = HeadlessClient::for_port(&self.headless_host, port)
            .with_directory(config.working_dir.display().to_string())
            .with_retry_policy(self.retry);

        self.wait_for_health(&client, cancel).await?;

        let session = client
            .create_session(cancel, Some(&config.issue_id))
            .await?;
        info!(issue_id = %config.issue_id, session = %session.id, "created remote session");

        if !config.prompt.is_empty() {
            let options = MessageOptions {
                model: config.model().map(str::to_string),
                variant: config.variant().map(str::to_string),
                agent: None,
            };
            client
                .send_message_async(cancel, &session.id, &config.prompt, &options)
                .await?;
        }
        Ok(session.id)
    }

    async fn wait_for_health(&self, client: &HeadlessClient, cancel: &CancellationToken) -> Result<()> {
        let deadline = Instant::now() + self.startup_timeout;
        loop {
            if client.is_healthy(cancel).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Unavailable(format!(
                    "headless server at {} not healthy after {}s",
                    client.base_url(),
                    self.startup_timeout.as_secs()
                )));
            }
            self.pause(cancel).await?;
        }
    }

    /// Poll the pane until `pattern` shows up. On timeout the prompt is sent
    /// anyway; the agent may still accept it.
    async fn wait_for_ready(
        &self,
        session: &str,
        pattern: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if pattern.is_empty() {
            return Ok(());
        }
        let deadline = Instant::now() + self.startup_timeout;
        loop {
            let screen = self.tmux.capture_pane(session, self.capture_lines).await?;
            if screen.contains(pattern) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(session = %session, pattern = %pattern, "ready pattern not seen, sending prompt anyway");
                return Ok(());
            }
            self.pause(cancel).await?;
        }
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(self.poll_interval) => Ok(()),
        }
    }
}

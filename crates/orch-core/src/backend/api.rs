use orch_store::{Run, RunStatus};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::SendOptions;
use super::terminal::DEFAULT_CAPTURE_LINES;
use crate::agent::opencode::HEADLESS_HOST;
use crate::error::{Error, Result};
use crate::headless::{HeadlessClient, MessageOptions, MessageWithParts, RetryPolicy, SessionStatus};

/// Backend for agents served over HTTP by a local headless server.
#[derive(Debug, Clone)]
pub struct ApiBackend {
    host: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    capture_lines: usize,
}

impl Default for ApiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiBackend {
    pub fn new() -> Self {
        Self {
            host: HEADLESS_HOST.to_string(),
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
            capture_lines: DEFAULT_CAPTURE_LINES,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_capture_lines(mut self, lines: usize) -> Self {
        self.capture_lines = lines;
        self
    }

    /// Client for the server a run is attached to.
    pub fn client_for(&self, run: &Run) -> Result<HeadlessClient> {
        let port = run.server_port.ok_or_else(|| {
            Error::Config(format!(
                "run {}/{} has no server port",
                run.issue_id, run.run_id
            ))
        })?;
        let client = HeadlessClient::for_port(&self.host, port)
            .with_http_client(self.http.clone())
            .with_retry_policy(self.retry);
        Ok(match &run.worktree_path {
            Some(dir) => client.with_directory(dir.display().to_string()),
            None => client,
        })
    }

    /// Server healthy and the run's session known to it.
    pub async fn is_alive(&self, run: &Run, cancel: &CancellationToken) -> bool {
        let (Ok(client), Ok(session_id)) = (self.client_for(run), remote_session_of(run)) else {
            return false;
        };
        if !client.is_healthy(cancel).await {
            return false;
        }
        match client.list_sessions(cancel).await {
            Ok(sessions) => sessions.iter().any(|s| s.id == session_id),
            Err(e) => {
                debug!(session = %session_id, error = %e, "listing sessions failed");
                false
            }
        }
    }

    /// The session transcript rendered as `[role] text` lines, keeping the
    /// most recent lines.
    pub async fn capture_output(&self, run: &Run, cancel: &CancellationToken) -> Result<String> {
        let client = self.client_for(run)?;
        let session_id = remote_session_of(run)?;
        let messages = client.messages(cancel, session_id).await?;
        Ok(render_transcript(&messages, self.capture_lines))
    }

    /// Remote status is authoritative, so transcript text never signals a
    /// prompt.
    pub fn detect_prompt(&self, _text: &str) -> bool {
        false
    }

    /// Map remote session status onto the run status lattice.
    ///
    /// A run still starting is reported `running` without asking the server.
    /// A session missing from the status map is idle (`blocked`). Query
    /// errors give no opinion.
    pub async fn get_status(&self, run: &Run, cancel: &CancellationToken) -> Option<RunStatus> {
        if run.status.is_starting() {
            return Some(RunStatus::Running);
        }
        let client = self.client_for(run).ok()?;
        let session_id = remote_session_of(run).ok()?;
        let statuses = match client.session_statuses(cancel).await {
            Ok(map) => map,
            Err(e) => {
                debug!(session = %session_id, error = %e, "session status query failed");
                return None;
            }
        };
        Some(match statuses.get(session_id) {
            Some(SessionStatus::Busy) => RunStatus::Running,
            Some(SessionStatus::Idle) | None => RunStatus::Blocked,
            Some(SessionStatus::Retry { .. }) => RunStatus::BlockedApi,
        })
    }

    /// Queue `text` on the run's remote session.
    pub async fn send_message(
        &self,
        run: &Run,
        text: &str,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let client = self.client_for(run)?;
        let session_id = remote_session_of(run)?;
        let message_options = MessageOptions {
            model: options.model.clone(),
            variant: options.variant.clone(),
            agent: options.agent.clone(),
        };
        client
            .send_message_async(cancel, session_id, text, &message_options)
            .await?;
        debug!(
            issue_id = %run.issue_id,
            run_id = %run.run_id,
            session = %session_id,
            "queued message on remote session"
        );
        Ok(())
    }
}

fn remote_session_of(run: &Run) -> Result<&str> {
    run.session_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "run {}/{} has no remote session id",
                run.issue_id, run.run_id
            ))
        })
}

/// Render messages as role-tagged lines, keeping the last `max_lines`.
pub fn render_transcript(messages: &[MessageWithParts], max_lines: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    for message in messages {
        let text = message.text();
        if text.trim().is_empty() {
            continue;
        }
        for (i, line) in text.lines().enumerate() {
            if i == 0 {
                lines.push(format!("[{}] {line}", message.info.role));
            } else {
                lines.push(line.to_string());
            }
        }
    }
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

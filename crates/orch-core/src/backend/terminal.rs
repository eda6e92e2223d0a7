use orch_store::{Run, RunStatus};
use tracing::debug;

use super::SendOptions;
use super::tmux::Tmux;
use crate::error::{Error, Result};
use crate::status::{self, Classification, RunState};

/// Default number of pane lines captured per poll.
pub const DEFAULT_CAPTURE_LINES: usize = 200;

/// Backend for agents running as interactive processes inside tmux.
#[derive(Debug, Clone)]
pub struct TerminalBackend {
    tmux: Tmux,
    capture_lines: usize,
}

impl TerminalBackend {
    pub fn new(tmux: Tmux) -> Self {
        Self {
            tmux,
            capture_lines: DEFAULT_CAPTURE_LINES,
        }
    }

    pub fn with_capture_lines(mut self, lines: usize) -> Self {
        self.capture_lines = lines;
        self
    }

    /// Whether the run's tmux session exists. A run without a recorded
    /// session, or a tmux failure, counts as dead.
    pub async fn is_alive(&self, run: &Run) -> bool {
        let Some(session) = run.tmux_session.as_deref() else {
            return false;
        };
        match self.tmux.has_session(session).await {
            Ok(alive) => alive,
            Err(e) => {
                debug!(session = %session, error = %e, "has-session failed");
                false
            }
        }
    }

    pub async fn capture_output(&self, run: &Run) -> Result<String> {
        let session = session_of(run)?;
        self.tmux.capture_pane(session, self.capture_lines).await
    }

    pub fn detect_prompt(&self, text: &str) -> bool {
        status::is_waiting_for_input(text)
    }

    /// Map a classification of `text` to a run status.
    ///
    /// A process that exited back to the shell is `done` if a completion was
    /// already recorded or the same capture shows one, and `failed`
    /// otherwise.
    pub fn get_status(
        &self,
        text: &str,
        state: &RunState,
        output_changed: bool,
        has_prompt: bool,
    ) -> Option<RunStatus> {
        let classification = status::classify(text, output_changed, has_prompt)?;
        Some(match classification {
            Classification::Exited
                if state.completion_recorded || status::is_completed(text) =>
            {
                RunStatus::Done
            }
            Classification::Exited => RunStatus::Failed,
            Classification::Completed => RunStatus::Done,
            Classification::ApiLimited => RunStatus::BlockedApi,
            Classification::Failed => RunStatus::Failed,
            Classification::Working => RunStatus::Running,
            Classification::WaitingForInput => RunStatus::Blocked,
        })
    }

    /// Type `text` into the session, followed by Enter unless
    /// `options.no_enter` is set.
    pub async fn send_message(&self, run: &Run, text: &str, options: &SendOptions) -> Result<()> {
        let session = session_of(run)?;
        if !self.tmux.has_session(session).await? {
            return Err(Error::SessionNotFound(session.to_string()));
        }
        self.tmux.send_literal(session, text).await?;
        if !options.no_enter {
            self.tmux.send_enter(session).await?;
        }
        debug!(
            issue_id = %run.issue_id,
            run_id = %run.run_id,
            session = %session,
            "delivered message as keystrokes"
        );
        Ok(())
    }
}

fn session_of(run: &Run) -> Result<&str> {
    run.tmux_session
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "run {}/{} has no tmux session",
                run.issue_id, run.run_id
            ))
        })
}

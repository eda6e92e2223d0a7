//! Typed wrapper over the `tmux` CLI.
//!
//! All invocations go through the injected [`CommandRunner`], so tests can
//! script tmux responses without a server.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::exec::{CommandOutput, CommandRunner};

/// stderr fragments tmux prints when the target session is gone.
const MISSING_SESSION_MARKERS: &[&str] = &[
    "can't find session",
    "can't find pane",
    "session not found",
    "no server running",
    "no current target",
];

/// Session name for a run: `orch-<issue>-<run>`, with characters tmux
/// rejects in names replaced by `-`.
pub fn session_name(issue_id: &str, run_id: &str) -> String {
    let raw = format!("orch-{issue_id}-{run_id}");
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct Tmux {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl std::fmt::Debug for Tmux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tmux").field("binary", &self.binary).finish()
    }
}

impl Tmux {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            binary: "tmux".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Whether the named session exists.
    pub async fn has_session(&self, name: &str) -> Result<bool> {
        let output = self
            .runner
            .run(&self.binary, &args(["has-session", "-t", &exact(name)]))
            .await?;
        Ok(output.success())
    }

    /// Start a detached session running `command` in `dir`.
    pub async fn new_session(
        &self,
        name: &str,
        dir: &Path,
        env: &[(String, String)],
        command: &str,
    ) -> Result<()> {
        let mut argv = args(["new-session", "-d", "-s", name, "-c"]);
        argv.push(dir.display().to_string());
        for (key, value) in env {
            argv.push("-e".to_string());
            argv.push(format!("{key}={value}"));
        }
        argv.push(command.to_string());

        self.checked(name, argv).await.map(drop)
    }

    /// The last `lines` lines of the session's pane, scrollback included.
    pub async fn capture_pane(&self, name: &str, lines: usize) -> Result<String> {
        let start = format!("-{lines}");
        let output = self
            .checked(name, args(["capture-pane", "-p", "-t", &pane(name), "-S", &start]))
            .await?;
        Ok(output.stdout)
    }

    /// Type `text` into the pane without interpreting key names.
    pub async fn send_literal(&self, name: &str, text: &str) -> Result<()> {
        self.checked(name, args(["send-keys", "-t", &pane(name), "-l", "--", text]))
            .await
            .map(drop)
    }

    pub async fn send_enter(&self, name: &str) -> Result<()> {
        self.checked(name, args(["send-keys", "-t", &pane(name), "Enter"]))
            .await
            .map(drop)
    }

    pub async fn kill_session(&self, name: &str) -> Result<()> {
        self.checked(name, args(["kill-session", "-t", &exact(name)]))
            .await
            .map(drop)
    }

    /// Run tmux and turn a failed exit into an error, recognising a missing
    /// session.
    async fn checked(&self, session: &str, argv: Vec<String>) -> Result<CommandOutput> {
        debug!(session = %session, args = ?argv, "tmux");
        let output = self.runner.run(&self.binary, &argv).await?;
        if output.success() {
            return Ok(output);
        }

        let stderr = output.stderr.trim().to_string();
        let lower = stderr.to_lowercase();
        if MISSING_SESSION_MARKERS.iter().any(|m| lower.contains(m)) {
            return Err(Error::SessionNotFound(session.to_string()));
        }
        Err(Error::Command {
            program: self.binary.clone(),
            code: output.code,
            stderr,
        })
    }
}

/// `=name` targets the session with exactly this name rather than a prefix
/// match.
fn exact(name: &str) -> String {
    format!("={name}")
}

/// Active pane of exactly the session `name`.
fn pane(name: &str) -> String {
    format!("={name}:")
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_name_sanitizes() {
        assert_eq!(session_name("issue-7", "ab12cd34"), "orch-issue-7-ab12cd34");
        assert_eq!(session_name("feat.x", "r:1"), "orch-feat-x-r-1");
        assert_eq!(session_name("a b", "c/d"), "orch-a-b-c-d");
    }

    #[test]
    fn exact_target_prefix() {
        assert_eq!(exact("orch-1"), "=orch-1");
        assert_eq!(pane("orch-1"), "=orch-1:");
    }
}

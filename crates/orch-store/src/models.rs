use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which coding agent a run was started with.
///
/// Fixed at run creation; the backend used to supervise the run is derived
/// from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Claude,
    Codex,
    Gemini,
    Opencode,
    Custom,
}

impl AgentType {
    /// Every known agent type, in display order.
    pub const ALL: [AgentType; 5] = [
        Self::Claude,
        Self::Codex,
        Self::Gemini,
        Self::Opencode,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Opencode => "opencode",
            Self::Custom => "custom",
        }
    }

    /// Whether this agent runs as a headless HTTP server rather than an
    /// interactive terminal process.
    pub fn is_headless(&self) -> bool {
        matches!(self, Self::Opencode)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = AgentTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            "gemini" => Ok(Self::Gemini),
            "opencode" => Ok(Self::Opencode),
            "custom" => Ok(Self::Custom),
            other => Err(AgentTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unknown [`AgentType`] identifier.
#[derive(Debug, Clone)]
pub struct AgentTypeParseError(pub String);

impl fmt::Display for AgentTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown agent: {:?}", self.0)
    }
}

impl std::error::Error for AgentTypeParseError {}

// ---------------------------------------------------------------------------

/// Run-time status of a supervised run.
///
/// ```text
/// queued -> booting -> running <-> blocked <-> blocked_api
///                         |
///                         +-> done | failed | unknown
/// ```
///
/// `running`, `blocked` and `blocked_api` oscillate as the agent alternates
/// between working and waiting. `done`, `failed` and `unknown` are never left
/// by automatic classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Booting,
    Running,
    Blocked,
    BlockedApi,
    Done,
    Failed,
    Unknown,
}

impl RunStatus {
    /// Whether the classifier stops re-evaluating a run in this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Unknown)
    }

    /// Whether the run has not yet reached its first working state.
    pub fn is_starting(&self) -> bool {
        matches!(self, Self::Queued | Self::Booting)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Booting => "booting",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::BlockedApi => "blocked_api",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for RunStatus {
    type Err = RunStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "booting" => Ok(Self::Booting),
            "running" => Ok(Self::Running),
            "blocked" => Ok(Self::Blocked),
            "blocked_api" => Ok(Self::BlockedApi),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "unknown" => Ok(Self::Unknown),
            other => Err(RunStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RunStatus`] string.
#[derive(Debug, Clone)]
pub struct RunStatusParseError(pub String);

impl fmt::Display for RunStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid run status: {:?}", self.0)
    }
}

impl std::error::Error for RunStatusParseError {}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One supervised execution attempt of an agent against an issue.
///
/// The backend handle is either a tmux session name (terminal agents) or a
/// server port plus remote session id (headless agents). Terminal agents
/// hosting a headless server carry both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub issue_id: String,
    pub run_id: String,
    pub agent: AgentType,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a freshly queued run.
    pub fn new(issue_id: impl Into<String>, run_id: impl Into<String>, agent: AgentType) -> Self {
        let now = Utc::now();
        Self {
            issue_id: issue_id.into(),
            run_id: run_id.into(),
            agent,
            status: RunStatus::Queued,
            tmux_session: None,
            server_port: None,
            session_id: None,
            worktree_path: None,
            branch: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Record a new status and bump `updated_at`.
    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// The leading characters of the run id used for display and prefix
    /// lookups.
    pub fn short_id(&self) -> &str {
        let end = self
            .run_id
            .char_indices()
            .nth(SHORT_ID_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.run_id.len());
        &self.run_id[..end]
    }
}

/// Number of characters in a run's short id.
pub const SHORT_ID_LEN: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_type_round_trips_through_str() {
        for agent in AgentType::ALL {
            let parsed: AgentType = agent.to_string().parse().unwrap();
            assert_eq!(parsed, agent);
        }
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let err = "aider".parse::<AgentType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown agent: \"aider\"");
    }

    #[test]
    fn only_opencode_is_headless() {
        let headless: Vec<_> = AgentType::ALL.iter().filter(|a| a.is_headless()).collect();
        assert_eq!(headless, vec![&AgentType::Opencode]);
    }

    #[test]
    fn blocked_api_serializes_snake_case() {
        let json = serde_json::to_string(&RunStatus::BlockedApi).unwrap();
        assert_eq!(json, "\"blocked_api\"");
        assert_eq!("blocked_api".parse::<RunStatus>().unwrap(), RunStatus::BlockedApi);
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Done.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Unknown.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Blocked.is_terminal());
        assert!(!RunStatus::BlockedApi.is_terminal());
    }

    #[test]
    fn short_id_truncates() {
        let run = Run::new("issue-1", "0123456789abcdef", AgentType::Claude);
        assert_eq!(run.short_id(), "01234567");

        let short = Run::new("issue-1", "abc", AgentType::Claude);
        assert_eq!(short.short_id(), "abc");
    }

    #[test]
    fn run_json_omits_missing_handles() {
        let run = Run::new("issue-1", "run-1", AgentType::Codex);
        let json = serde_json::to_value(&run).unwrap();
        assert!(json.get("tmux_session").is_none());
        assert!(json.get("server_port").is_none());
        assert_eq!(json["status"], "queued");
        assert_eq!(json["agent"], "codex");
    }
}

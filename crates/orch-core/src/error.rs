//! Error taxonomy shared by the supervisor components.
//!
//! - Configuration errors are fatal to the requested operation and never
//!   retried.
//! - `SessionNotFound` / `Unavailable` tell callers the backend is gone so
//!   they can decide whether to restart it.
//! - HTTP and transport failures are retried locally where the operation
//!   allows it; only the final failure surfaces.

use thiserror::Error;

use orch_store::StoreError;

/// Convenience alias used across `orch-core`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid launch/send configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// No adapter is registered for the requested agent identifier.
    #[error("agent not found: {0}")]
    NotFound(String),

    /// The backend session disappeared (tmux session gone, remote session
    /// unknown).
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The backend is not reachable at all (health check failed).
    #[error("backend not available: {0}")]
    Unavailable(String),

    /// The headless server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A subprocess exited unsuccessfully.
    #[error("{program} failed (exit {code:?}): {stderr}")]
    Command {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Malformed message on the daemon socket.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The daemon handled the request and reported a failure.
    #[error("daemon: {0}")]
    Daemon(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a bounded retry loop should try again after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Config(_))
    }

    /// Whether the error means the backend session no longer exists.
    pub fn is_session_missing(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_and_config_are_not_retryable() {
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::Config("port".into()).is_retryable());
        assert!(
            Error::Http {
                status: 500,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(Error::Unavailable("down".into()).is_retryable());
    }

    #[test]
    fn session_missing_kinds() {
        assert!(Error::SessionNotFound("orch-1".into()).is_session_missing());
        assert!(Error::Unavailable("health".into()).is_session_missing());
        assert!(!Error::Cancelled.is_session_missing());
    }
}

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use super::protocol::{Request, Response, SendRequest};
use super::{DaemonPaths, process_alive};
use crate::error::{Error, Result};

/// Default bound on one request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client side of the daemon socket.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    paths: DaemonPaths,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(paths: DaemonPaths) -> Self {
        Self {
            paths,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A daemon is up when its recorded pid is alive and its socket exists.
    pub fn is_running(&self) -> bool {
        self.paths.read_pid().is_some_and(process_alive) && self.paths.socket.exists()
    }

    /// Ask the daemon to deliver a message. A failure reported by the daemon
    /// comes back as [`Error::Daemon`].
    pub async fn send(&self, request: SendRequest) -> Result<()> {
        let response = self.request(&Request::Send(request)).await?;
        if response.ok {
            Ok(())
        } else {
            Err(Error::Daemon(
                response
                    .error
                    .unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }

    /// One request/response exchange.
    pub async fn request(&self, request: &Request) -> Result<Response> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| {
                Error::Unavailable(format!(
                    "daemon did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
    }

    async fn exchange(&self, request: &Request) -> Result<Response> {
        let mut stream = UnixStream::connect(&self.paths.socket).await?;
        let body = serde_json::to_vec(request)?;
        stream.write_all(&body).await?;
        stream.shutdown().await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;
        serde_json::from_slice(&reply)
            .map_err(|e| Error::Protocol(format!("malformed daemon response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_running_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = DaemonClient::new(DaemonPaths::for_vault(dir.path()));
        assert!(!client.is_running());
    }

    #[test]
    fn not_running_with_pid_but_no_socket() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DaemonPaths::for_vault(dir.path());
        std::fs::create_dir_all(paths.pid_file.parent().unwrap()).unwrap();
        std::fs::write(&paths.pid_file, std::process::id().to_string()).unwrap();
        assert!(!DaemonClient::new(paths).is_running());
    }

    #[tokio::test]
    async fn connect_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = DaemonClient::new(DaemonPaths::for_vault(dir.path()));
        let err = client
            .send(SendRequest::new("i", "r", "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }
}

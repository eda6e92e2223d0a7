use std::io::ErrorKind;
use std::sync::Arc;

use orch_store::RunStore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::DaemonPaths;
use super::protocol::{MAX_REQUEST_BYTES, Request, Response, SendRequest, decode_request};
use crate::backend::{BackendFactory, SendOptions};
use crate::error::{Error, Result};

/// The daemon: accepts socket connections and forwards send requests to
/// run backends.
pub struct DaemonServer {
    paths: DaemonPaths,
    store: Arc<dyn RunStore>,
    backends: BackendFactory,
}

impl DaemonServer {
    pub fn new(paths: DaemonPaths, store: Arc<dyn RunStore>, backends: BackendFactory) -> Self {
        Self {
            paths,
            store,
            backends,
        }
    }

    pub fn paths(&self) -> &DaemonPaths {
        &self.paths
    }

    /// Bind the socket, replacing a stale socket file.
    ///
    /// Fails if another daemon answers on the socket.
    pub async fn bind(&self) -> Result<UnixListener> {
        let socket = &self.paths.socket;
        if let Some(parent) = socket.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if socket.exists() {
            if UnixStream::connect(socket).await.is_ok() {
                return Err(Error::Io(std::io::Error::new(
                    ErrorKind::AddrInUse,
                    format!("daemon already running at {}", socket.display()),
                )));
            }
            debug!(path = %socket.display(), "removing stale socket");
            match tokio::fs::remove_file(socket).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(UnixListener::bind(socket)?)
    }

    /// Bind and serve until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, cancel).await
    }

    /// Serve connections on `listener` until `cancel` fires, then remove the
    /// socket and pid files.
    pub async fn serve(self, listener: UnixListener, cancel: CancellationToken) -> Result<()> {
        tokio::fs::write(&self.paths.pid_file, std::process::id().to_string()).await?;
        info!(path = %self.paths.socket.display(), "daemon listening");

        let handler = Arc::new(Handler {
            store: self.store,
            backends: self.backends,
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&handler);
                        let cancel = cancel.child_token();
                        tokio::spawn(async move {
                            if let Err(e) = handler.serve_connection(stream, &cancel).await {
                                debug!(error = %e, "daemon connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "daemon accept failed"),
                },
            }
        }

        info!("daemon shutting down");
        let _ = tokio::fs::remove_file(&self.paths.socket).await;
        let _ = tokio::fs::remove_file(&self.paths.pid_file).await;
        Ok(())
    }
}

struct Handler {
    store: Arc<dyn RunStore>,
    backends: BackendFactory,
}

impl Handler {
    async fn serve_connection(&self, stream: UnixStream, cancel: &CancellationToken) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        let response = match read_request(&mut reader).await? {
            Ok(bytes) => match decode_request(&bytes) {
                Ok(request) => self.handle(request, cancel).await,
                Err(message) => Response::error(message),
            },
            Err(message) => Response::error(message),
        };

        let body = serde_json::to_vec(&response)?;
        writer.write_all(&body).await?;
        writer.shutdown().await?;
        Ok(())
    }

    async fn handle(&self, request: Request, cancel: &CancellationToken) -> Response {
        match request {
            Request::Send(send) => match self.send(&send, cancel).await {
                Ok(()) => Response::ok(),
                Err(e) => {
                    warn!(issue_id = %send.issue_id, run_id = %send.run_id, error = %e, "daemon send failed");
                    Response::error(e.to_string())
                }
            },
        }
    }

    async fn send(&self, request: &SendRequest, cancel: &CancellationToken) -> Result<()> {
        let run = self
            .store
            .resolve_run(&request.issue_id, &request.run_id)
            .await?;
        let backend = self.backends.for_run(&run);
        let options = SendOptions {
            no_enter: request.no_enter,
            ..SendOptions::default()
        };
        backend
            .send_message(&run, &request.message, &options, cancel)
            .await?;
        info!(issue_id = %run.issue_id, run_id = %run.run_id, "delivered message");
        Ok(())
    }
}

/// Read until a complete JSON value has arrived or the peer half-closes.
///
/// The outer `Err` is an I/O failure; the inner one is a message for the
/// client.
async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<std::result::Result<Vec<u8>, String>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(Ok(buf));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(Err(format!(
                "request exceeds {MAX_REQUEST_BYTES} bytes"
            )));
        }
        match serde_json::from_slice::<serde_json::Value>(&buf) {
            Ok(_) => return Ok(Ok(buf)),
            Err(e) if e.is_eof() => continue,
            // Let the decoder report the syntax error.
            Err(_) => return Ok(Ok(buf)),
        }
    }
}

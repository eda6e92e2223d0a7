use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::retry::{RetryPolicy, with_retry};
use super::types::{
    CreateSessionRequest, Health, MessageOptions, MessageWithParts, Project, PromptRequest,
    Session, SessionStatus,
};
use crate::error::{Error, Result};

/// Header carrying the project directory a call is scoped to.
pub const DIRECTORY_HEADER: &str = "x-opencode-directory";

/// Timeout for ordinary request/response calls. Synchronous message sends
/// and the event stream have none.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one headless agent server.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HeadlessClient {
    base_url: String,
    directory: Option<String>,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl HeadlessClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            directory: None,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Client for a server on `host:port`.
    pub fn for_port(host: &str, port: u16) -> Self {
        Self::new(format!("http://{host}:{port}"))
    }

    /// Scope directory-aware calls to `dir`.
    pub fn with_directory(mut self, dir: impl Into<String>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    // -- health / metadata ------------------------------------------------

    pub async fn health(&self, cancel: &CancellationToken) -> Result<Health> {
        self.fetch(cancel, self.request(Method::GET, "/global/health"))
            .await
    }

    /// Whether the server answers its health check with `healthy: true`.
    pub async fn is_healthy(&self, cancel: &CancellationToken) -> bool {
        match self.health(cancel).await {
            Ok(h) => h.healthy,
            Err(e) => {
                debug!(base_url = %self.base_url, error = %e, "health check failed");
                false
            }
        }
    }

    pub async fn current_project(&self, cancel: &CancellationToken) -> Result<Project> {
        self.fetch(cancel, self.request(Method::GET, "/project/current"))
            .await
    }

    /// Configured providers, passed through untyped.
    pub async fn providers(&self, cancel: &CancellationToken) -> Result<serde_json::Value> {
        self.fetch(cancel, self.request(Method::GET, "/provider"))
            .await
    }

    /// Server configuration, passed through untyped.
    pub async fn config(&self, cancel: &CancellationToken) -> Result<serde_json::Value> {
        self.fetch(cancel, self.request(Method::GET, "/config"))
            .await
    }

    // -- sessions ---------------------------------------------------------

    /// Create a remote session, retrying transient failures.
    pub async fn create_session(
        &self,
        cancel: &CancellationToken,
        title: Option<&str>,
    ) -> Result<Session> {
        let body = &CreateSessionRequest {
            title: title.map(str::to_string),
        };
        with_retry(cancel, &self.retry, || async move {
            self.fetch(cancel, self.request(Method::POST, "/session").json(body))
                .await
        })
        .await
    }

    pub async fn list_sessions(&self, cancel: &CancellationToken) -> Result<Vec<Session>> {
        self.fetch(cancel, self.request(Method::GET, "/session"))
            .await
    }

    pub async fn get_session(&self, cancel: &CancellationToken, session_id: &str) -> Result<Session> {
        let path = format!("/session/{session_id}");
        self.fetch(cancel, self.request(Method::GET, &path))
            .await
            .map_err(|e| not_found_as_session_missing(e, session_id))
    }

    /// Full transcript of a session, oldest message first.
    pub async fn messages(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
    ) -> Result<Vec<MessageWithParts>> {
        let path = format!("/session/{session_id}/message");
        self.fetch(cancel, self.request(Method::GET, &path))
            .await
            .map_err(|e| not_found_as_session_missing(e, session_id))
    }

    /// Status of every session the server knows about.
    pub async fn session_statuses(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, SessionStatus>> {
        self.fetch(cancel, self.request(Method::GET, "/session/status"))
            .await
    }

    /// Ask the server to stop the session's current turn.
    pub async fn abort_session(&self, cancel: &CancellationToken, session_id: &str) -> Result<bool> {
        let path = format!("/session/{session_id}/abort");
        self.fetch(cancel, self.request(Method::POST, &path))
            .await
            .map_err(|e| not_found_as_session_missing(e, session_id))
    }

    // -- messages ---------------------------------------------------------

    /// Send a message and wait for the assistant's reply.
    ///
    /// No client-side timeout: a turn can take as long as the agent needs.
    /// Use `cancel` to give up.
    pub async fn send_message(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        text: &str,
        options: &MessageOptions,
    ) -> Result<MessageWithParts> {
        let body = PromptRequest::new(text, options)?;
        let path = format!("/session/{session_id}/message");
        let request = self.untimed_request(Method::POST, &path).json(&body);
        self.fetch(cancel, request).await
    }

    /// Queue a message without waiting for the reply, retrying transient
    /// failures.
    pub async fn send_message_async(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        text: &str,
        options: &MessageOptions,
    ) -> Result<()> {
        let body = &PromptRequest::new(text, options)?;
        let path = &format!("/session/{session_id}/prompt_async");
        with_retry(cancel, &self.retry, || async move {
            self.execute(cancel, self.request(Method::POST, path).json(body))
                .await
                .map(drop)
        })
        .await
    }

    /// Start a synchronous send in the background and return immediately.
    ///
    /// Used when the session is busy: the server queues the message behind
    /// the running turn. Failures are logged; await the handle to observe
    /// them directly.
    pub fn queue_message(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        text: &str,
        options: &MessageOptions,
    ) -> JoinHandle<Result<MessageWithParts>> {
        let client = self.clone();
        let cancel = cancel.child_token();
        let session_id = session_id.to_string();
        let text = text.to_string();
        let options = options.clone();

        tokio::spawn(async move {
            let result = client
                .send_message(&cancel, &session_id, &text, &options)
                .await;
            if let Err(e) = &result {
                warn!(session = %session_id, error = %e, "queued message failed");
            }
            result
        })
    }

    // -- plumbing ---------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Request with the directory header and the default timeout.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.untimed_request(method, path).timeout(REQUEST_TIMEOUT)
    }

    /// Request with the directory header and no timeout.
    pub(crate) fn untimed_request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.directory {
            Some(dir) => builder.header(DIRECTORY_HEADER, dir),
            None => builder,
        }
    }

    /// Send `request`, failing on non-success status.
    pub(crate) async fn execute(
        &self,
        cancel: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<Response> {
        let response = cancellable(cancel, async { Ok(request.send().await?) }).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(cancel, request).await?;
        cancellable(cancel, decode(response)).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Race `fut` against the token; cancellation wins ties.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

fn not_found_as_session_missing(err: Error, session_id: &str) -> Error {
    match err {
        Error::Http { status: 404, .. } => Error::SessionNotFound(session_id.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = HeadlessClient::new("http://127.0.0.1:4096/");
        assert_eq!(client.base_url(), "http://127.0.0.1:4096");
        assert_eq!(client.url("/session"), "http://127.0.0.1:4096/session");
    }

    #[test]
    fn for_port_builds_http_url() {
        let client = HeadlessClient::for_port("127.0.0.1", 4242).with_directory("/work");
        assert_eq!(client.base_url(), "http://127.0.0.1:4242");
        assert_eq!(client.directory(), Some("/work"));
    }

    #[test]
    fn directory_header_is_attached() {
        let client = HeadlessClient::new("http://localhost:1").with_directory("/repo/a");
        let request = client.request(Method::GET, "/session").build().unwrap();
        assert_eq!(
            request.headers().get(DIRECTORY_HEADER).unwrap(),
            "/repo/a"
        );
        assert_eq!(request.timeout(), Some(&REQUEST_TIMEOUT));

        let untimed = client
            .untimed_request(Method::POST, "/session/s/message")
            .build()
            .unwrap();
        assert_eq!(untimed.timeout(), None);
    }

    #[test]
    fn no_directory_means_no_header() {
        let client = HeadlessClient::new("http://localhost:1");
        let request = client.request(Method::GET, "/session").build().unwrap();
        assert!(request.headers().get(DIRECTORY_HEADER).is_none());
    }

    #[test]
    fn not_found_maps_to_session_missing() {
        let err = not_found_as_session_missing(
            Error::Http {
                status: 404,
                body: String::new(),
            },
            "ses_1",
        );
        assert!(matches!(err, Error::SessionNotFound(ref id) if id == "ses_1"));

        let other = not_found_as_session_missing(
            Error::Http {
                status: 500,
                body: String::new(),
            },
            "ses_1",
        );
        assert!(matches!(other, Error::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_not_healthy() {
        // Port 9 (discard) on localhost is almost never served.
        let client = HeadlessClient::new("http://127.0.0.1:9");
        assert!(!client.is_healthy(&CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_requests() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = HeadlessClient::new("http://127.0.0.1:9");
        let err = client.list_sessions(&cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}

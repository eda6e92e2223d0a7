//! Shared test doubles for orch integration tests.
//!
//! - [`FakeRunner`]: a [`CommandRunner`] that records every invocation and
//!   answers from scripted rules instead of spawning processes.
//! - [`FakeHeadlessServer`]: an axum app on an ephemeral localhost port that
//!   mimics the headless agent server's REST and event surface, with knobs
//!   for injecting failures.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use orch_core::exec::{CommandOutput, CommandRunner};
use orch_core::headless::DIRECTORY_HEADER;

// ---------------------------------------------------------------------------
// FakeRunner
// ---------------------------------------------------------------------------

/// One recorded subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
}

impl Call {
    /// First argument (the tmux subcommand, for tmux calls).
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Recording, scriptable command runner.
///
/// Rules match on an argument prefix; the most recently added matching rule
/// wins. Unmatched calls succeed with empty output.
#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<Call>>,
    rules: Mutex<Vec<(Vec<String>, CommandOutput)>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer calls whose arguments start with `prefix` with `output`.
    pub fn respond(&self, prefix: &[&str], output: CommandOutput) {
        lock(&self.rules).push((prefix.iter().map(|s| s.to_string()).collect(), output));
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Calls whose first argument is `subcommand`.
    pub fn calls_to(&self, subcommand: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.subcommand() == Some(subcommand))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        lock(&self.calls).push(Call {
            program: program.to_string(),
            args: args.to_vec(),
        });
        let rules = lock(&self.rules);
        let output = rules
            .iter()
            .rev()
            .find(|(prefix, _)| args.starts_with(prefix))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// FakeHeadlessServer
// ---------------------------------------------------------------------------

/// A request the fake server received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Value of the directory header, if sent.
    pub directory: Option<String>,
    pub body: Value,
}

#[derive(Debug)]
struct FakeState {
    healthy: bool,
    /// Remaining mutating requests to answer with HTTP 500.
    fail_next: u32,
    next_session: u32,
    sessions: Vec<Value>,
    statuses: HashMap<String, Value>,
    messages: HashMap<String, Vec<Value>>,
    event_lines: Vec<String>,
    requests: Vec<RecordedRequest>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            healthy: true,
            fail_next: 0,
            next_session: 1,
            sessions: Vec::new(),
            statuses: HashMap::new(),
            messages: HashMap::new(),
            event_lines: Vec::new(),
            requests: Vec::new(),
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// In-process stand-in for the headless agent server.
///
/// The server stops when this value is dropped.
pub struct FakeHeadlessServer {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeHeadlessServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = router(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake headless server");
        let addr = listener.local_addr().expect("fake server address");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state, task }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_healthy(&self, healthy: bool) {
        lock(&self.state).healthy = healthy;
    }

    /// Answer the next `n` mutating requests (create session, async send)
    /// with HTTP 500.
    pub fn fail_next(&self, n: u32) {
        lock(&self.state).fail_next = n;
    }

    /// Register an existing session.
    pub fn add_session(&self, id: &str) {
        let mut state = lock(&self.state);
        state.sessions.push(session_json(id, "existing"));
        state.messages.entry(id.to_string()).or_default();
    }

    /// Set the `/session/status` entry for a session (`{"type": "busy"}` etc).
    pub fn set_status(&self, id: &str, status: Value) {
        lock(&self.state).statuses.insert(id.to_string(), status);
    }

    /// Append a text message to a session's transcript.
    pub fn push_message(&self, id: &str, role: &str, text: &str) {
        let mut state = lock(&self.state);
        let transcript = state.messages.entry(id.to_string()).or_default();
        let n = transcript.len() + 1;
        transcript.push(message_json(id, &format!("msg_{n}"), role, text));
    }

    /// Raw line emitted on `/event` (include the `data: ` prefix).
    pub fn push_event_line(&self, line: &str) {
        lock(&self.state).event_lines.push(line.to_string());
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests to `path` with method `method`.
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

impl Drop for FakeHeadlessServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/global/health", get(health))
        .route("/project/current", get(project))
        .route("/provider", get(providers))
        .route("/config", get(config))
        .route("/session", get(list_sessions).post(create_session))
        .route("/session/status", get(session_status))
        .route("/session/{id}", get(get_session))
        .route("/session/{id}/message", get(list_messages).post(send_message))
        .route("/session/{id}/prompt_async", post(prompt_async))
        .route("/session/{id}/abort", post(abort))
        .route("/event", get(events))
        .with_state(state)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record(state: &mut FakeState, method: &str, path: String, headers: &HeaderMap, body: &Bytes) {
    let directory = headers
        .get(DIRECTORY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice(body).unwrap_or(Value::Null);
    state.requests.push(RecordedRequest {
        method: method.to_string(),
        path,
        directory,
        body,
    });
}

/// Consume one injected failure, if any are left.
fn take_failure(state: &mut FakeState) -> bool {
    if state.fail_next > 0 {
        state.fail_next -= 1;
        true
    } else {
        false
    }
}

fn session_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "projectID": "proj_fake",
        "time": {"created": 1, "updated": 1}
    })
}

fn message_json(session_id: &str, id: &str, role: &str, text: &str) -> Value {
    json!({
        "info": {"id": id, "role": role, "sessionID": session_id},
        "parts": [{"type": "text", "text": text}]
    })
}

fn not_found(id: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": format!("session {id} not found")}))).into_response()
}

fn injected_failure() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response()
}

async fn health(State(state): State<Shared>) -> Response {
    if lock(&state).healthy {
        Json(json!({"healthy": true, "version": "fake"})).into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn project(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    record(&mut state, "GET", "/project/current".into(), &headers, &Bytes::new());
    let worktree = headers
        .get(DIRECTORY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/");
    Json(json!({"id": "proj_fake", "worktree": worktree, "vcs": "git"})).into_response()
}

async fn providers() -> Response {
    Json(json!({"providers": [], "default": {}})).into_response()
}

async fn config() -> Response {
    Json(json!({})).into_response()
}

async fn list_sessions(State(state): State<Shared>) -> Response {
    Json(Value::Array(lock(&state).sessions.clone())).into_response()
}

async fn create_session(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let mut state = lock(&state);
    record(&mut state, "POST", "/session".into(), &headers, &body);
    if take_failure(&mut state) {
        return injected_failure();
    }
    let id = format!("ses_{}", state.next_session);
    state.next_session += 1;
    let title = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("title").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "untitled".to_string());
    let session = session_json(&id, &title);
    state.sessions.push(session.clone());
    state.messages.insert(id, Vec::new());
    Json(session).into_response()
}

async fn session_status(State(state): State<Shared>) -> Response {
    let statuses: serde_json::Map<String, Value> = lock(&state)
        .statuses
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Json(Value::Object(statuses)).into_response()
}

async fn get_session(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = lock(&state);
    match state.sessions.iter().find(|s| s["id"] == id.as_str()) {
        Some(session) => Json(session.clone()).into_response(),
        None => not_found(&id),
    }
}

async fn list_messages(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    match lock(&state).messages.get(&id) {
        Some(messages) => Json(Value::Array(messages.clone())).into_response(),
        None => not_found(&id),
    }
}

async fn send_message(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = lock(&state);
    record(&mut state, "POST", format!("/session/{id}/message"), &headers, &body);
    let Some(transcript) = state.messages.get_mut(&id) else {
        return not_found(&id);
    };
    let text = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v["parts"][0]["text"].as_str().map(str::to_string))
        .unwrap_or_default();
    let n = transcript.len();
    transcript.push(message_json(&id, &format!("msg_{}", n + 1), "user", &text));
    let reply = message_json(&id, &format!("msg_{}", n + 2), "assistant", &format!("ack: {text}"));
    transcript.push(reply.clone());
    Json(reply).into_response()
}

async fn prompt_async(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = lock(&state);
    record(&mut state, "POST", format!("/session/{id}/prompt_async"), &headers, &body);
    if take_failure(&mut state) {
        return injected_failure();
    }
    if !state.messages.contains_key(&id) {
        return not_found(&id);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn abort(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    record(&mut state, "POST", format!("/session/{id}/abort"), &headers, &Bytes::new());
    Json(Value::Bool(state.messages.contains_key(&id))).into_response()
}

/// Emits the scripted event lines and closes the stream.
async fn events(State(state): State<Shared>) -> Response {
    let mut body = lock(&state).event_lines.join("\n");
    body.push('\n');
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

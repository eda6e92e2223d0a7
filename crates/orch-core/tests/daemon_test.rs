//! IPC daemon end to end over a real Unix socket.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use orch_core::Error;
use orch_core::backend::BackendFactory;
use orch_core::daemon::{DaemonClient, DaemonPaths, DaemonServer, Response, SendRequest};
use orch_store::{AgentType, MemoryRunStore, Run, RunStatus};
use orch_test_utils::FakeRunner;

struct Harness {
    _vault: tempfile::TempDir,
    paths: DaemonPaths,
    runner: Arc<FakeRunner>,
    cancel: CancellationToken,
    task: JoinHandle<orch_core::Result<()>>,
}

impl Harness {
    async fn start(runs: Vec<Run>) -> Self {
        let vault = tempfile::tempdir().unwrap();
        let paths = DaemonPaths::for_vault(vault.path());
        let runner = FakeRunner::new();
        let store = Arc::new(MemoryRunStore::with_runs(runs));
        let server = DaemonServer::new(paths.clone(), store, BackendFactory::new(runner.clone()));

        let listener = server.bind().await.unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.serve(listener, cancel.clone()));

        // Wait for the pid file so `is_running` is meaningful.
        for _ in 0..100 {
            if paths.pid_file.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self {
            _vault: vault,
            paths,
            runner,
            cancel,
            task,
        }
    }

    fn client(&self) -> DaemonClient {
        DaemonClient::new(self.paths.clone()).with_timeout(Duration::from_secs(10))
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.task.await.unwrap().unwrap();
    }
}

fn terminal_run(issue: &str, run: &str) -> Run {
    let mut r = Run::new(issue, run, AgentType::Claude);
    r.status = RunStatus::Running;
    r.tmux_session = Some(format!("orch-{issue}-{run}"));
    r
}

async fn raw_exchange(paths: &DaemonPaths, body: &[u8]) -> Response {
    let mut stream = UnixStream::connect(&paths.socket).await.unwrap();
    stream.write_all(body).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    serde_json::from_slice(&reply).unwrap()
}

#[tokio::test]
async fn send_request_reaches_terminal_session() {
    let harness = Harness::start(vec![terminal_run("issue", "run")]).await;

    let response = raw_exchange(
        &harness.paths,
        br#"{"type":"send","issueID":"issue","runID":"run","message":"test"}"#,
    )
    .await;
    assert_eq!(response, Response::ok());

    let sends = harness.runner.calls_to("send-keys");
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0].args, ["send-keys", "-t", "=orch-issue-run:", "-l", "--", "test"]);
    assert_eq!(sends[1].args, ["send-keys", "-t", "=orch-issue-run:", "Enter"]);

    harness.stop().await;
}

#[tokio::test]
async fn client_reports_running_and_sends() {
    let harness = Harness::start(vec![terminal_run("issue-7", "a1b2c3d4e5")]).await;
    let client = harness.client();
    assert!(client.is_running());

    // Short-id prefix resolves to the run.
    let mut request = SendRequest::new("issue-7", "a1b2", "partial input");
    request.no_enter = true;
    client.send(request).await.unwrap();

    let sends = harness.runner.calls_to("send-keys");
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].args[5], "partial input");

    harness.stop().await;
}

#[tokio::test]
async fn unknown_run_comes_back_as_daemon_error() {
    let harness = Harness::start(vec![]).await;
    let err = harness
        .client()
        .send(SendRequest::new("issue", "nope", "hi"))
        .await
        .unwrap_err();
    match err {
        Error::Daemon(message) => assert!(message.contains("run not found"), "{message}"),
        other => panic!("expected daemon error, got {other:?}"),
    }
    harness.stop().await;
}

#[tokio::test]
async fn bad_requests_get_error_responses() {
    let harness = Harness::start(vec![]).await;

    let unknown = raw_exchange(&harness.paths, br#"{"type":"status"}"#).await;
    assert!(!unknown.ok);
    assert!(unknown.error.unwrap().contains("unknown request type"));

    let garbage = raw_exchange(&harness.paths, b"not json").await;
    assert!(!garbage.ok);
    assert!(garbage.error.unwrap().contains("invalid JSON"));

    harness.stop().await;
}

#[tokio::test]
async fn concurrent_clients_are_served() {
    let runs = (0..8).map(|i| terminal_run("issue", &format!("run{i}"))).collect();
    let harness = Harness::start(runs).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = harness.client();
        handles.push(tokio::spawn(async move {
            client
                .send(SendRequest::new("issue", format!("run{i}"), format!("msg {i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(harness.runner.calls_to("send-keys").len(), 16);

    harness.stop().await;
}

#[tokio::test]
async fn shutdown_removes_socket_and_pid_file() {
    let harness = Harness::start(vec![]).await;
    let paths = harness.paths.clone();
    let vault = harness._vault.path().to_path_buf();
    assert!(paths.socket.exists());
    assert!(paths.pid_file.exists());

    harness.cancel.cancel();
    harness.task.await.unwrap().unwrap();
    assert!(!paths.socket.exists());
    assert!(!paths.pid_file.exists());
    assert!(!DaemonClient::new(DaemonPaths::for_vault(&vault)).is_running());
    drop(harness._vault);
}

#[tokio::test]
async fn stale_socket_is_replaced_and_live_one_refused() {
    let vault = tempfile::tempdir().unwrap();
    let paths = DaemonPaths::for_vault(vault.path());
    std::fs::create_dir_all(paths.socket.parent().unwrap()).unwrap();

    // A socket file nobody listens on.
    drop(std::os::unix::net::UnixListener::bind(&paths.socket).unwrap());
    assert!(paths.socket.exists());

    let store = Arc::new(MemoryRunStore::new());
    let factory = BackendFactory::new(FakeRunner::new());
    let first = DaemonServer::new(paths.clone(), store.clone(), factory.clone());
    let _listener = first.bind().await.unwrap();

    let second = DaemonServer::new(paths.clone(), store, factory);
    let err = second.bind().await.unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::AddrInUse),
        other => panic!("expected AddrInUse, got {other:?}"),
    }
}

//! Headless client against the fake headless server.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use orch_core::Error;
use orch_core::headless::{HeadlessClient, MessageOptions, RetryPolicy, SessionStatus};
use orch_test_utils::FakeHeadlessServer;

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    }
}

fn client(server: &FakeHeadlessServer) -> HeadlessClient {
    HeadlessClient::new(server.base_url())
        .with_directory("/work/repo")
        .with_retry_policy(fast_retry(3))
}

// ===========================================================================
// Health and metadata
// ===========================================================================

#[tokio::test]
async fn health_reflects_server_state() {
    let server = FakeHeadlessServer::start().await;
    let client = client(&server);
    let cancel = CancellationToken::new();

    let health = client.health(&cancel).await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.version.as_deref(), Some("fake"));
    assert!(client.is_healthy(&cancel).await);

    server.set_healthy(false);
    assert!(!client.is_healthy(&cancel).await);
    assert!(matches!(
        client.health(&cancel).await,
        Err(Error::Http { status: 503, .. })
    ));
}

#[tokio::test]
async fn project_and_config_are_directory_scoped() {
    let server = FakeHeadlessServer::start().await;
    let client = client(&server);
    let cancel = CancellationToken::new();

    let project = client.current_project(&cancel).await.unwrap();
    assert_eq!(project.worktree.as_deref(), Some("/work/repo"));

    assert!(client.providers(&cancel).await.unwrap().get("providers").is_some());
    assert!(client.config(&cancel).await.unwrap().is_object());
}

// ===========================================================================
// Sessions
// ===========================================================================

#[tokio::test]
async fn create_session_sends_directory_header_and_title() {
    let server = FakeHeadlessServer::start().await;
    let client = client(&server);
    let cancel = CancellationToken::new();

    let session = client.create_session(&cancel, Some("issue-42")).await.unwrap();
    assert_eq!(session.id, "ses_1");
    assert_eq!(session.title, "issue-42");

    let requests = server.requests_to("POST", "/session");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].directory.as_deref(), Some("/work/repo"));
    assert_eq!(requests[0].body, json!({"title": "issue-42"}));

    let listed = client.list_sessions(&cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    let fetched = client.get_session(&cancel, "ses_1").await.unwrap();
    assert_eq!(fetched, session);
}

#[tokio::test]
async fn create_session_retries_transient_failures() {
    let server = FakeHeadlessServer::start().await;
    server.fail_next(2);
    let client = client(&server);

    let session = client
        .create_session(&CancellationToken::new(), None)
        .await
        .unwrap();
    assert_eq!(session.id, "ses_1");
    assert_eq!(server.requests_to("POST", "/session").len(), 3);
}

#[tokio::test]
async fn create_session_surfaces_last_error_after_budget() {
    let server = FakeHeadlessServer::start().await;
    server.fail_next(10);
    let client = client(&server);

    let err = client
        .create_session(&CancellationToken::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http { status: 500, .. }), "got {err:?}");
    assert_eq!(server.requests_to("POST", "/session").len(), 3);
}

#[tokio::test]
async fn unknown_session_is_session_not_found() {
    let server = FakeHeadlessServer::start().await;
    let client = client(&server);
    let cancel = CancellationToken::new();

    let err = client.get_session(&cancel, "ses_missing").await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(ref id) if id == "ses_missing"));

    let err = client.messages(&cancel, "ses_missing").await.unwrap_err();
    assert!(err.is_session_missing());
}

#[tokio::test]
async fn session_statuses_decode() {
    let server = FakeHeadlessServer::start().await;
    server.set_status("ses_a", json!({"type": "busy"}));
    server.set_status("ses_b", json!({"type": "retry", "attempt": 1, "message": "overloaded", "next": 0}));
    let statuses = client(&server)
        .session_statuses(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(statuses["ses_a"], SessionStatus::Busy);
    assert!(matches!(statuses["ses_b"], SessionStatus::Retry { attempt: 1, .. }));
    assert!(!statuses.contains_key("ses_c"));
}

#[tokio::test]
async fn abort_reports_known_sessions() {
    let server = FakeHeadlessServer::start().await;
    server.add_session("ses_x");
    let client = client(&server);
    let cancel = CancellationToken::new();
    assert!(client.abort_session(&cancel, "ses_x").await.unwrap());
    assert!(!client.abort_session(&cancel, "ses_y").await.unwrap());
}

// ===========================================================================
// Messages
// ===========================================================================

#[tokio::test]
async fn async_send_omits_unset_model_and_variant() {
    let server = FakeHeadlessServer::start().await;
    server.add_session("ses_1");
    client(&server)
        .send_message_async(&CancellationToken::new(), "ses_1", "do it", &MessageOptions::default())
        .await
        .unwrap();

    let requests = server.requests_to("POST", "/session/ses_1/prompt_async");
    assert_eq!(requests.len(), 1);
    let body = &requests[0].body;
    assert_eq!(body, &json!({"parts": [{"type": "text", "text": "do it"}]}));
    assert!(body.get("model").is_none());
    assert!(body.get("variant").is_none());
}

#[tokio::test]
async fn async_send_puts_variant_at_top_level() {
    let server = FakeHeadlessServer::start().await;
    server.add_session("ses_1");
    let options = MessageOptions {
        model: Some("openai/gpt-5".into()),
        variant: Some("high".into()),
        agent: None,
    };
    client(&server)
        .send_message_async(&CancellationToken::new(), "ses_1", "go", &options)
        .await
        .unwrap();

    let body = &server.requests_to("POST", "/session/ses_1/prompt_async")[0].body;
    assert_eq!(body["variant"], "high");
    assert_eq!(body["model"], json!({"providerID": "openai", "modelID": "gpt-5"}));
    assert!(body["model"].get("variant").is_none());
}

#[tokio::test]
async fn async_send_retries_then_succeeds() {
    let server = FakeHeadlessServer::start().await;
    server.add_session("ses_1");
    server.fail_next(1);
    client(&server)
        .send_message_async(&CancellationToken::new(), "ses_1", "again", &MessageOptions::default())
        .await
        .unwrap();
    assert_eq!(server.requests_to("POST", "/session/ses_1/prompt_async").len(), 2);
}

#[tokio::test]
async fn malformed_model_is_config_error_without_request() {
    let server = FakeHeadlessServer::start().await;
    server.add_session("ses_1");
    let options = MessageOptions {
        model: Some("no-slash".into()),
        ..MessageOptions::default()
    };
    let err = client(&server)
        .send_message_async(&CancellationToken::new(), "ses_1", "x", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(server.requests_to("POST", "/session/ses_1/prompt_async").is_empty());
}

#[tokio::test]
async fn sync_send_returns_reply() {
    let server = FakeHeadlessServer::start().await;
    server.add_session("ses_1");
    let client = client(&server);
    let cancel = CancellationToken::new();

    let reply = client
        .send_message(&cancel, "ses_1", "ping", &MessageOptions::default())
        .await
        .unwrap();
    assert_eq!(reply.info.role, "assistant");
    assert_eq!(reply.text(), "ack: ping");

    let transcript = client.messages(&cancel, "ses_1").await.unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].text(), "ping");
}

#[tokio::test]
async fn queued_send_runs_in_background() {
    let server = FakeHeadlessServer::start().await;
    server.add_session("ses_1");
    let handle = client(&server).queue_message(
        &CancellationToken::new(),
        "ses_1",
        "later",
        &MessageOptions::default(),
    );
    let reply = handle.await.unwrap().unwrap();
    assert_eq!(reply.text(), "ack: later");
    assert_eq!(server.requests_to("POST", "/session/ses_1/message").len(), 1);
}

// ===========================================================================
// Events
// ===========================================================================

#[tokio::test]
async fn event_stream_skips_malformed_records() {
    let server = FakeHeadlessServer::start().await;
    server.push_event_line(r#"data: {"type":"server.connected","properties":{}}"#);
    server.push_event_line(": keep-alive");
    server.push_event_line("data: {broken");
    server.push_event_line("");
    server.push_event_line(r#"data: {"type":"session.idle","properties":{"sessionID":"ses_1"}}"#);

    let cancel = CancellationToken::new();
    let mut events = client(&server).subscribe_events(&cancel).await.unwrap();

    let first = events.recv().await.unwrap();
    assert_eq!(first.kind, "server.connected");
    let second = events.recv().await.unwrap();
    assert_eq!(second.kind, "session.idle");
    assert_eq!(second.session_id(), Some("ses_1"));
    // The fake closes the stream after the scripted lines.
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn cancelling_closes_event_queue() {
    let server = FakeHeadlessServer::start().await;
    let cancel = CancellationToken::new();
    let mut events = client(&server).subscribe_events(&cancel).await.unwrap();
    cancel.cancel();
    let next = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap();
    assert!(next.is_none());
}

//! Live event subscription over `GET /event`.
//!
//! The server streams `data: <json>` lines. A background task decodes them
//! one at a time into a bounded queue; a record that fails to decode is
//! logged and skipped. The task ends on EOF, transport error or
//! cancellation, and dropping the subscription cancels it.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use reqwest::Method;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::{HeadlessClient, cancellable};
use super::types::Event;
use crate::error::Result;

/// Capacity of the queue between the reader task and the consumer.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Receiving end of a live event stream.
#[derive(Debug)]
pub struct EventSubscription {
    rx: mpsc::Receiver<Event>,
    cancel: CancellationToken,
}

impl EventSubscription {
    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Stop the reader task. Events already queued can still be received.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for EventSubscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }
}

impl HeadlessClient {
    /// Open the event stream.
    ///
    /// Returns once the server has accepted the request; events are read in
    /// the background. Cancelling `cancel` closes the stream and its queue.
    pub async fn subscribe_events(&self, cancel: &CancellationToken) -> Result<EventSubscription> {
        let request = self
            .untimed_request(Method::GET, "/event")
            .header(ACCEPT, "text/event-stream");
        let response = self.execute(cancel, request).await?;

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let token = cancel.child_token();
        tokio::spawn(read_events(response, tx, token.clone()));

        Ok(EventSubscription { rx, cancel: token })
    }
}

async fn read_events(
    response: reqwest::Response,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    let mut body = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
            Some(Err(e)) => {
                warn!(error = %e, "event stream transport error");
                return;
            }
            None => {
                // Flush a final record that arrived without a newline.
                let rest = String::from_utf8_lossy(&buf).into_owned();
                if let Some(event) = parse_event_line(&rest) {
                    let _ = forward(&tx, &cancel, event).await;
                }
                debug!("event stream closed by server");
                return;
            }
        }

        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_event_line(&line) {
                if !forward(&tx, &cancel, event).await {
                    return;
                }
            }
        }
    }
}

/// Push one event, giving up on cancellation or a dropped receiver.
async fn forward(tx: &mpsc::Sender<Event>, cancel: &CancellationToken, event: Event) -> bool {
    let sent = cancellable(cancel, async {
        Ok(tx.send(event).await.is_ok())
    })
    .await;
    matches!(sent, Ok(true))
}

/// Decode one SSE line. Only `data:` lines carry events; blank lines,
/// comments and other fields yield `None`, as do records that fail to
/// decode.
pub fn parse_event_line(line: &str) -> Option<Event> {
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "skipping malformed event record");
            None
        }
    }
}

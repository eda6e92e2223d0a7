//! Client for the headless agent server.
//!
//! [`HeadlessClient`] wraps the server's REST surface: session lifecycle,
//! synchronous/asynchronous/queued message delivery and an SSE event
//! subscription. Mutating calls go through [`retry::with_retry`]; every call
//! takes a [`tokio_util::sync::CancellationToken`].

pub mod client;
pub mod events;
pub mod retry;
pub mod types;

pub use client::{DIRECTORY_HEADER, HeadlessClient, REQUEST_TIMEOUT};
pub use events::{EVENT_QUEUE_CAPACITY, EventSubscription, parse_event_line};
pub use retry::{RetryPolicy, with_retry};
pub use types::{
    Event, Health, MessageOptions, MessageWithParts, ModelRef, Project, PromptRequest, Session,
    SessionStatus,
};

//! JSON messages exchanged over the daemon socket.
//!
//! One request and one response per connection. Neither side relies on a
//! trailing newline: the server stops reading as soon as a complete JSON
//! value has arrived, and the client half-closes after writing.

use serde::{Deserialize, Serialize};

/// Upper bound on a request body.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// A request sent to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Deliver a message to a running session.
    Send(SendRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(rename = "issueID")]
    pub issue_id: String,
    /// Exact run id or unique short-id prefix.
    #[serde(rename = "runID")]
    pub run_id: String,
    pub message: String,
    #[serde(rename = "noEnter", default, skip_serializing_if = "is_false")]
    pub no_enter: bool,
}

impl SendRequest {
    pub fn new(
        issue_id: impl Into<String>,
        run_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_id: issue_id.into(),
            run_id: run_id.into(),
            message: message.into(),
            no_enter: false,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The daemon's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

/// Decode a request body, producing a client-facing message on failure.
///
/// Unknown `type` values are reported by name rather than as a generic
/// decode error.
pub fn decode_request(bytes: &[u8]) -> Result<Request, String> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {e}"))?;
    match value.get("type").and_then(|t| t.as_str()) {
        Some("send") => {
            serde_json::from_value(value).map_err(|e| format!("invalid send request: {e}"))
        }
        Some(other) => Err(format!("unknown request type: {other:?}")),
        None => Err("request is missing \"type\"".to_string()),
    }
}

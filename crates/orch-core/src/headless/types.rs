//! Wire types for the headless agent server.
//!
//! Only the fields the supervisor needs are modelled; everything else the
//! server sends is ignored on decode.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// `GET /global/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `GET /project/current`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<String>,
}

/// A remote session. Owned by the server; the supervisor keeps only its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(rename = "projectID", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<SessionTime>,
}

/// Millisecond timestamps attached to a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTime {
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub updated: i64,
}

/// Message metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub role: String,
    #[serde(rename = "sessionID", default)]
    pub session_id: String,
}

/// One part of a message. Non-text parts keep only their type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// `GET /session/{id}/message` entry and synchronous send reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithParts {
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessageWithParts {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.kind == "text")
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Per-session entry of `GET /session/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Busy,
    Retry {
        #[serde(default)]
        attempt: u32,
        #[serde(default)]
        message: String,
        #[serde(default)]
        next: i64,
    },
}

/// A record from the `GET /event` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Event {
    /// The session the event belongs to, wherever the server put it.
    pub fn session_id(&self) -> Option<&str> {
        let props = &self.properties;
        props
            .get("sessionID")
            .or_else(|| props.get("info").and_then(|i| i.get("sessionID")))
            .or_else(|| props.get("part").and_then(|p| p.get("sessionID")))
            .and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// `POST /session` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Provider/model pair as the server expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "modelID")]
    pub model_id: String,
}

impl ModelRef {
    /// Parse `provider/model` (the model part may itself contain slashes).
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok(Self {
                provider_id: provider.to_string(),
                model_id: model.to_string(),
            }),
            _ => Err(Error::Config(format!(
                "model {s:?} must be in provider/model form"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextPartInput {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Body for `POST /session/{id}/message` and `/prompt_async`.
///
/// `model`, `variant` and `agent` are omitted entirely when unset; the
/// variant sits at the top level, never inside `model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRequest {
    pub parts: Vec<TextPartInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Caller-facing knobs for a message send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// `provider/model`.
    pub model: Option<String>,
    pub variant: Option<String>,
    pub agent: Option<String>,
}

impl PromptRequest {
    pub fn new(text: impl Into<String>, options: &MessageOptions) -> Result<Self> {
        let model = options
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(ModelRef::parse)
            .transpose()?;
        Ok(Self {
            parts: vec![TextPartInput {
                kind: "text",
                text: text.into(),
            }],
            model,
            variant: options.variant.clone().filter(|v| !v.is_empty()),
            agent: options.agent.clone().filter(|a| !a.is_empty()),
        })
    }
}

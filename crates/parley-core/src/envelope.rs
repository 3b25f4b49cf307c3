//! The wire envelope.
//!
//! Every frame exchanged with a client is one self-contained JSON object:
//!
//! ```json
//! {"type":"chat_response","content":"hi","user_id":"u1","data":{...},"timestamp":"2026-01-01T00:00:00Z"}
//! ```
//!
//! Outbound, absent optional fields are omitted rather than written as
//! `null`. Inbound, unknown fields are ignored and only `type` is required.
//! The `data` payload is opaque to the hub: producers and consumers agree on
//! its shape, the transport never looks inside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::UserId;

/// Type tag of an [`Envelope`].
///
/// Unrecognised tags are preserved in [`EnvelopeKind::Unknown`] so they can be
/// logged before being discarded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeKind {
    /// Hub-originated notice, e.g. the welcome message.
    System,
    /// Assistant reply pushed by the chat pipeline.
    ChatResponse,
    /// Application-level liveness request from a client.
    Ping,
    /// Reply to [`EnvelopeKind::Ping`].
    Pong,
    /// Chat text sent by a client over the socket (observed, not authoritative).
    Chat,
    /// Free-form application data.
    Data,
    /// Any other tag.
    Unknown(String),
}

impl EnvelopeKind {
    /// The wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::ChatResponse => "chat_response",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Chat => "chat",
            Self::Data => "data",
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<String> for EnvelopeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "system" => Self::System,
            "chat_response" => Self::ChatResponse,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "chat" => Self::Chat,
            "data" => Self::Data,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<EnvelopeKind> for String {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Unknown(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message unit, independent of transport framing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Discriminating tag.
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Text payload.
    #[serde(default)]
    pub content: String,
    /// Originating user; absent for system messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Originating user's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Opaque structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Set by the hub at dispatch or by the session at receipt.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Create an envelope with no sender and no payload.
    pub fn new(kind: EnvelopeKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            user_id: None,
            username: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// A hub-originated `system` notice.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::System, content)
    }

    /// The reply to an inbound `ping`.
    pub fn pong() -> Self {
        Self::new(EnvelopeKind::Pong, "pong")
    }

    /// An assistant reply carrying the persisted user and assistant turns.
    pub fn chat_response(content: impl Into<String>, user_turn: Value, assistant_turn: Value) -> Self {
        Self::new(EnvelopeKind::ChatResponse, content).with_data(serde_json::json!({
            "user_message": user_turn,
            "assistant_message": assistant_turn,
        }))
    }

    /// Attach the originating user.
    #[must_use]
    pub fn with_sender(mut self, user_id: UserId, username: impl Into<String>) -> Self {
        self.user_id = Some(user_id);
        self.username = Some(username.into());
        self
    }

    /// Attach an opaque payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Overwrite the timestamp with the current time.
    #[must_use]
    pub fn stamped_now(mut self) -> Self {
        self.timestamp = Utc::now();
        self
    }

    /// Serialize to the wire form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an inbound frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

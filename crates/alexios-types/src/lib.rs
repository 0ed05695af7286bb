//! Shared types for the Alexios mailbox skill.
//!
//! This crate holds the webhook envelope exchanged with the voice platform
//! and the message models shared between the store implementations and the
//! dispatcher. It has no knowledge of storage or transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only request type the skill accepts.
pub const TYPE_SIMPLE_UTTERANCE: &str = "SimpleUtterance";

/// Protocol version stamped on every response envelope.
pub const RESPONSE_VERSION: &str = "1.0";

/// Inbound webhook envelope sent by the voice platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRequest {
    /// The utterance itself.
    pub request: RequestPayload,
    /// Session metadata for the caller.
    pub session: Session,
    /// IANA time zone identifier of the caller's device (e.g. `Europe/Moscow`).
    #[serde(default)]
    pub timezone: String,
}

/// The utterance part of a [`SkillRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Request kind; only [`TYPE_SIMPLE_UTTERANCE`] is handled.
    #[serde(rename = "type")]
    pub kind: String,
    /// Transcribed command text.
    #[serde(default)]
    pub command: String,
}

/// Session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// `true` on the first request of a conversation.
    #[serde(default)]
    pub new: bool,
    /// The caller.
    pub user: SessionUser,
}

/// Caller identity as supplied by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Opaque identity token, stable for a given speaker.
    pub user_id: String,
}

/// Outbound webhook envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillResponse {
    /// Text the assistant will speak.
    pub response: ResponsePayload,
    /// Always [`RESPONSE_VERSION`].
    pub version: String,
}

impl SkillResponse {
    /// Wraps reply text in a response envelope.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            response: ResponsePayload { text: text.into() },
            version: RESPONSE_VERSION.to_string(),
        }
    }
}

/// The spoken part of a [`SkillResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub text: String,
}

/// A stored message, as returned by `get_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier. Never reused.
    pub id: i64,
    /// Identity token of the sender.
    pub sender: String,
    /// When the message was accepted.
    pub sent_at: DateTime<Utc>,
    /// Message text, exactly as dictated.
    pub payload: String,
}

/// A message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: String,
    pub sent_at: DateTime<Utc>,
    pub payload: String,
}

impl NewMessage {
    /// Attaches a store-assigned id.
    pub fn into_message(self, id: i64) -> Message {
        Message {
            id,
            sender: self.sender,
            sent_at: self.sent_at,
            payload: self.payload,
        }
    }
}

/// A mailbox entry: enough to index a message and fetch it by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: i64,
    pub sender: String,
    pub sent_at: DateTime<Utc>,
}

impl From<&Message> for MessageSummary {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender: message.sender.clone(),
            sent_at: message.sent_at,
        }
    }
}

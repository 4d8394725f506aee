//! Push event types delivered over the push channel.
//!
//! `PushEvent` serializes as `{"event": <name>, "data": <payload>}`, which is the
//! exact frame written to WebSocket clients. All variants are Clone + Send + Sync
//! for use with tokio mpsc and broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::chat::MessageRole;
use crate::user::UserId;

/// Events pushed to connected recipients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    /// An assistant message produced for the recipient.
    NewMessage(NewMessagePayload),

    /// A failed interpretation or a quota denial.
    ErrorMessage(ErrorMessagePayload),

    /// Broadcast to all listeners whenever a new session is started.
    NewActivity(NewActivityPayload),

    /// Relay only: a relay-side user completed authentication.
    UserAuthed(RelayUserPayload),

    /// Relay only: a relay-side user was upgraded to premium.
    UserUpgradedToPremium(RelayUserPayload),
}

impl PushEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::NewMessage(_) => "new_message",
            PushEvent::ErrorMessage(_) => "error_message",
            PushEvent::NewActivity(_) => "new_activity",
            PushEvent::UserAuthed(_) => "user_authed",
            PushEvent::UserUpgradedToPremium(_) => "user_upgraded_to_premium",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub session_id: Uuid,
}

/// Kind of failure reported through `error_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Quota denial; clients show an upgrade or wait hint.
    NoInterpretations,
    /// Oracle failure or any other error after admission.
    InterpretationFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessagePayload {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub content: String,
    /// Set when the failure is pushed to the relay on behalf of one of its users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivityPayload {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayUserPayload {
    pub external_user_id: String,
    pub name: String,
}

/// Logical push recipient: an authenticated user or the privileged relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientId {
    User(UserId),
    Relay,
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientId::User(id) => write!(f, "user:{id}"),
            RecipientId::Relay => write!(f, "relay"),
        }
    }
}

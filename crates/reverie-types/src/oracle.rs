//! Request and response shapes for the external interpretation oracle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, MessageRole};

/// Profile data the oracle uses to address the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(rename = "birthDate", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
}

/// One prior turn of the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Body of `POST {base}/interpret`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretRequest {
    pub user_info: UserInfo,
    pub new_message_text: String,
    pub history: Vec<HistoryEntry>,
    /// Opening prompts of recent prior sessions, already truncated.
    pub previous_dreams: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretResponse {
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub is_dream_related: bool,
}

/// A single field-level violation reported by the oracle with HTTP 422.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

/// Body of a 422 response from the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationBody {
    #[serde(default)]
    pub detail: Vec<FieldViolation>,
}

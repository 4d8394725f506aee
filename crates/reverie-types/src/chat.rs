//! Chat session and message types.
//!
//! A session is one conversation with the interpretation oracle, owned by a
//! single user. Messages within a session are ordered by creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::user::UserId;

/// Author of a message within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A persisted conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: UserId,
    /// Derived from the first prompt, see [`derive_title`].
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A single message within a chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// References to synthesized audio for this message, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a new message stamped with a fresh UUID v7 id and `created_at`.
    pub fn new(
        session_id: Uuid,
        role: MessageRole,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            role,
            content: content.into(),
            audio_refs: Vec::new(),
            created_at,
        }
    }
}

/// Lightweight list-view projection of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_items: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(total_items: u64, page: PageRequest) -> Self {
        let size = u64::from(page.page_size.max(1));
        let total_pages = total_items.div_ceil(size);
        Self {
            total_items,
            current_page: page.page,
            page_size: page.page_size,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}

/// One page of a user's sessions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPage {
    pub items: Vec<SessionSummary>,
    pub pagination: Pagination,
}

/// A session together with its ordered messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Clamp raw query values into a usable page request.
    ///
    /// Missing or zero values fall back to page 1 and `default_size`; the page
    /// size never exceeds `max_size`.
    pub fn normalize(
        page: Option<u32>,
        page_size: Option<u32>,
        default_size: u32,
        max_size: u32,
    ) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(default_size)
            .min(max_size.max(1));
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Derive a session title from its opening prompt.
///
/// Keeps the first `max_chars` characters and appends `...` when the prompt was
/// cut. Counts characters, not bytes, so multi-byte text is never split.
pub fn derive_title(prompt: &str, max_chars: usize) -> String {
    let prompt = prompt.trim();
    let mut chars = prompt.char_indices();
    match chars.nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &prompt[..byte_idx]),
        None => prompt.to_string(),
    }
}

/// Truncate a prior prompt for use as cross-session context.
pub fn preview(text: &str, max_chars: usize) -> String {
    derive_title(text, max_chars)
}

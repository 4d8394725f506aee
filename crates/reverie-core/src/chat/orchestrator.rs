//! Session orchestrator.
//!
//! Sequences one interpretation request: quota admission, session lookup or
//! creation, dispatch to the oracle, persistence, cache invalidation and
//! delivery. Per request the order is strictly admit, dispatch, persist,
//! invalidate, deliver. There is no retry; a failed request may be resubmitted.
//!
//! A spent quota unit is not refunded when dispatch fails.

use std::sync::Arc;

use chrono::Utc;
use reverie_types::chat::{
    ChatMessage, ChatSession, MessageRole, PageRequest, Pagination, SessionDetail, SessionPage,
    SessionSummary, derive_title,
};
use reverie_types::config::ReverieConfig;
use reverie_types::error::{ChatError, RepositoryError};
use reverie_types::event::{
    ErrorKind, ErrorMessagePayload, NewActivityPayload, NewMessagePayload, PushEvent, RecipientId,
};
use reverie_types::user::{User, UserId};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{AdvisoryCache, CacheTag, SessionCache};
use crate::chat::repository::ChatRepository;
use crate::oracle::{InterpretationDispatcher, InterpretationOracle};
use crate::push::PushRegistry;
use crate::quota::QuotaLedger;
use crate::repository::user::UserRepository;

/// Where a request came from, which decides how results and failures are pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A user whose live connection (if any) receives pushes.
    Web,
    /// The relay acting for one of its users; only failures are pushed, to the relay.
    Relay { external_user_id: String },
    /// No directed pushes; the caller only uses the returned value.
    Direct,
}

/// Who is asking for a read or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(UserId),
    /// Bypasses ownership checks.
    Admin,
}

impl Actor {
    fn may_access(&self, session: &ChatSession) -> bool {
        match self {
            Actor::User(id) => session.user_id == *id,
            Actor::Admin => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub title_chars: usize,
    pub prior_sessions: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl ChatSettings {
    pub fn from_config(config: &ReverieConfig) -> Self {
        Self {
            title_chars: config.chat.title_chars,
            prior_sessions: config.oracle.prior_sessions,
            default_page_size: config.chat.default_page_size,
            max_page_size: config.chat.max_page_size,
        }
    }

    /// Normalize raw paging input with the configured defaults and bounds.
    pub fn page(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        PageRequest::normalize(page, page_size, self.default_page_size, self.max_page_size)
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&ReverieConfig::default())
    }
}

/// Result of a successful session creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session_id: Uuid,
    pub assistant_text: String,
}

pub struct SessionOrchestrator<U, C, K, O>
where
    U: UserRepository,
    C: ChatRepository,
    K: SessionCache,
    O: InterpretationOracle,
{
    ledger: QuotaLedger<U>,
    chats: C,
    cache: AdvisoryCache<K>,
    dispatcher: InterpretationDispatcher<O>,
    push: Arc<PushRegistry>,
    settings: ChatSettings,
}

impl<U, C, K, O> SessionOrchestrator<U, C, K, O>
where
    U: UserRepository,
    C: ChatRepository,
    K: SessionCache,
    O: InterpretationOracle,
{
    pub fn new(
        ledger: QuotaLedger<U>,
        chats: C,
        cache: K,
        dispatcher: InterpretationDispatcher<O>,
        push: Arc<PushRegistry>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            ledger,
            chats,
            cache: AdvisoryCache::new(cache),
            dispatcher,
            push,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Start a new session with `prompt` as its opening message.
    pub async fn create_session(
        &self,
        user_id: &UserId,
        prompt: &str,
        origin: Origin,
    ) -> Result<CreatedSession, ChatError> {
        let prompt = validate_prompt(prompt)?;
        let started_at = Utc::now();

        let user = self.admit(user_id, &origin).await?;

        let prior_openings = match self
            .chats
            .recent_opening_prompts(user_id, self.settings.prior_sessions)
            .await
        {
            Ok(openings) => openings,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "prior sessions unavailable, continuing without them");
                Vec::new()
            }
        };

        let assistant_text = self
            .dispatch(&user, prompt, &[], &prior_openings, &origin)
            .await?;

        let session = ChatSession {
            id: Uuid::now_v7(),
            user_id: *user_id,
            title: derive_title(prompt, self.settings.title_chars),
            created_at: started_at,
        };
        let user_message = ChatMessage::new(session.id, MessageRole::User, prompt, started_at);
        let assistant_message = ChatMessage::new(
            session.id,
            MessageRole::Assistant,
            assistant_text.clone(),
            Utc::now(),
        );

        if let Err(e) = self
            .chats
            .create_session_with_messages(&session, &[user_message, assistant_message.clone()])
            .await
        {
            let err = ChatError::Storage(e.to_string());
            self.push_failure(user_id, &origin, &err);
            return Err(err);
        }

        self.cache.invalidate_session(user_id, &session.id).await;

        info!(user_id = %user_id, session_id = %session.id, "session created");
        self.deliver(user_id, &origin, &assistant_message, &session.title);

        Ok(CreatedSession {
            session_id: session.id,
            assistant_text,
        })
    }

    /// Add a follow-up prompt to an existing session and return the reply.
    ///
    /// Ownership is checked before admission, so a request for someone else's
    /// session never spends quota.
    pub async fn append_message(
        &self,
        user_id: &UserId,
        session_id: &Uuid,
        prompt: &str,
        origin: Origin,
    ) -> Result<String, ChatError> {
        let prompt = validate_prompt(prompt)?;
        let session = self.load_session(&Actor::User(*user_id), session_id).await?;

        let user = self.admit(user_id, &origin).await?;

        let history = self.chats.get_messages(session_id).await?;

        let user_message = ChatMessage::new(*session_id, MessageRole::User, prompt, Utc::now());
        self.chats.save_message(&user_message).await?;

        let dispatched = self.dispatch(&user, prompt, &history, &[], &origin).await;
        let assistant_text = match dispatched {
            Ok(text) => text,
            Err(err) => {
                // The user message is already stored.
                self.cache.invalidate_session(user_id, session_id).await;
                return Err(err);
            }
        };

        let assistant_message = ChatMessage::new(
            *session_id,
            MessageRole::Assistant,
            assistant_text.clone(),
            Utc::now(),
        );
        let saved = self.chats.save_message(&assistant_message).await;
        self.cache.invalidate_session(user_id, session_id).await;
        if let Err(e) = saved {
            let err = ChatError::Storage(e.to_string());
            self.push_failure(user_id, &origin, &err);
            return Err(err);
        }

        debug!(user_id = %user_id, session_id = %session_id, "message appended");
        self.deliver(user_id, &origin, &assistant_message, &session.title);

        Ok(assistant_text)
    }

    /// One page of the user's sessions, newest first.
    pub async fn list_sessions(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<SessionPage, ChatError> {
        let ticket = self.cache.ticket(CacheTag::SessionList(*user_id));
        if let Some(hit) = self.cache.get_page(user_id, &page).await {
            return Ok(hit);
        }

        let total = self.chats.count_sessions(user_id).await?;
        let sessions = self
            .chats
            .list_sessions(user_id, page.page_size, page.offset())
            .await?;

        let value = SessionPage {
            items: sessions.iter().map(SessionSummary::from).collect(),
            pagination: Pagination::new(total, page),
        };
        self.cache.put_page(ticket, user_id, &page, &value).await;
        Ok(value)
    }

    /// A session with its ordered messages. Ownership is enforced on cache hits too.
    pub async fn get_session(
        &self,
        actor: &Actor,
        session_id: &Uuid,
    ) -> Result<SessionDetail, ChatError> {
        let ticket = self.cache.ticket(CacheTag::SessionDetail(*session_id));
        if let Some(hit) = self.cache.get_detail(session_id).await {
            if !actor.may_access(&hit.session) {
                return Err(ChatError::Forbidden);
            }
            return Ok(hit);
        }

        let session = self.load_session(actor, session_id).await?;
        let messages = self.chats.get_messages(session_id).await?;
        let detail = SessionDetail { session, messages };
        self.cache.put_detail(ticket, &detail).await;
        Ok(detail)
    }

    /// Delete a session and its messages, then drop every cached view of it.
    pub async fn delete_session(&self, actor: &Actor, session_id: &Uuid) -> Result<(), ChatError> {
        let session = self.load_session(actor, session_id).await?;

        self.chats.delete_session(session_id).await.map_err(|e| match e {
            RepositoryError::NotFound => ChatError::NotFound("session"),
            other => ChatError::Storage(other.to_string()),
        })?;

        self.cache
            .invalidate_session(&session.user_id, session_id)
            .await;
        info!(session_id = %session_id, owner = %session.user_id, ?actor, "session deleted");
        Ok(())
    }

    async fn load_session(&self, actor: &Actor, session_id: &Uuid) -> Result<ChatSession, ChatError> {
        let session = self
            .chats
            .get_session(session_id)
            .await?
            .ok_or(ChatError::NotFound("session"))?;
        if !actor.may_access(&session) {
            return Err(ChatError::Forbidden);
        }
        Ok(session)
    }

    async fn admit(&self, user_id: &UserId, origin: &Origin) -> Result<User, ChatError> {
        match self.ledger.admit(user_id).await {
            Ok(user) => Ok(user),
            Err(err @ ChatError::AdmissionDenied { .. }) => {
                self.push_error(user_id, origin, ErrorKind::NoInterpretations, err.user_message());
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn dispatch(
        &self,
        user: &User,
        prompt: &str,
        history: &[ChatMessage],
        prior_openings: &[String],
        origin: &Origin,
    ) -> Result<String, ChatError> {
        let result = self
            .dispatcher
            .interpret(user, prompt, history, prior_openings)
            .await;
        if let Err(err) = &result {
            self.push_failure(&user.id, origin, err);
        }
        result
    }

    fn push_failure(&self, user_id: &UserId, origin: &Origin, err: &ChatError) {
        self.push_error(
            user_id,
            origin,
            ErrorKind::InterpretationFailed,
            err.user_message(),
        );
    }

    fn push_error(&self, user_id: &UserId, origin: &Origin, kind: ErrorKind, content: String) {
        let (recipient, external_user_id) = match origin {
            Origin::Web => (RecipientId::User(*user_id), None),
            Origin::Relay { external_user_id } => (RecipientId::Relay, Some(external_user_id.clone())),
            Origin::Direct => return,
        };
        self.push.send_to(
            recipient,
            PushEvent::ErrorMessage(ErrorMessagePayload {
                kind,
                content,
                external_user_id,
            }),
        );
    }

    fn deliver(&self, user_id: &UserId, origin: &Origin, message: &ChatMessage, title: &str) {
        if *origin == Origin::Web {
            let delivered = self.push.send_to(
                RecipientId::User(*user_id),
                PushEvent::NewMessage(NewMessagePayload {
                    id: message.id,
                    role: message.role,
                    content: message.content.clone(),
                    session_id: message.session_id,
                }),
            );
            debug!(user_id = %user_id, delivered, "assistant message pushed");
        }
        self.push.broadcast(PushEvent::NewActivity(NewActivityPayload {
            title: title.to_string(),
        }));
    }
}

fn validate_prompt(prompt: &str) -> Result<&str, ChatError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation("Prompt text must not be empty.".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prompt_trims() {
        assert_eq!(validate_prompt("  dream  ").unwrap(), "dream");
        assert!(matches!(validate_prompt(" \n\t "), Err(ChatError::Validation(_))));
    }

    #[test]
    fn test_admin_may_access_any_session() {
        let session = ChatSession {
            id: Uuid::now_v7(),
            user_id: UserId::new(),
            title: "t".to_string(),
            created_at: Utc::now(),
        };
        assert!(Actor::Admin.may_access(&session));
        assert!(Actor::User(session.user_id).may_access(&session));
        assert!(!Actor::User(UserId::new()).may_access(&session));
    }

    #[test]
    fn test_settings_page_uses_configured_bounds() {
        let settings = ChatSettings::default();
        let page = settings.page(None, Some(1000));
        assert_eq!(page, PageRequest { page: 1, page_size: 100 });
    }
}

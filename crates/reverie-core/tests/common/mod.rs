//! In-memory adapters for exercising reverie-core services end to end.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use reverie_core::cache::{CacheTag, SessionCache};
use reverie_core::chat::orchestrator::{ChatSettings, SessionOrchestrator};
use reverie_core::chat::repository::ChatRepository;
use reverie_core::oracle::{InterpretationDispatcher, InterpretationOracle};
use reverie_core::push::PushRegistry;
use reverie_core::quota::{QuotaLedger, QuotaPolicy};
use reverie_core::repository::user::UserRepository;
use reverie_types::chat::{ChatMessage, ChatSession, MessageRole, PageRequest, SessionDetail, SessionPage};
use reverie_types::config::AdmissionMode;
use reverie_types::error::{CacheError, OracleError, RepositoryError};
use reverie_types::oracle::InterpretRequest;
use reverie_types::user::{AccountStatus, SubscriptionTier, User, UserId};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryUsers {
    pub users: Arc<Mutex<HashMap<UserId, User>>>,
}

impl InMemoryUsers {
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn get(&self, id: &UserId) -> User {
        self.users.lock().unwrap()[id].clone()
    }
}

impl UserRepository for InMemoryUsers {
    async fn create_user(&self, user: &User) -> Result<User, RepositoryError> {
        self.insert(user.clone());
        Ok(user.clone())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn charge_quota(
        &self,
        id: &UserId,
        decrement: bool,
        stamp_free_at: Option<DateTime<Utc>>,
    ) -> Result<u32, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if decrement {
            user.remaining_interpretations = user.remaining_interpretations.saturating_sub(1);
        }
        if stamp_free_at.is_some() {
            user.last_free_interpretation_at = stamp_free_at;
        }
        Ok(user.remaining_interpretations)
    }

    async fn set_tier(
        &self,
        id: &UserId,
        tier: SubscriptionTier,
        remaining: u32,
    ) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        user.tier = tier;
        user.remaining_interpretations = remaining;
        Ok(())
    }

    async fn set_status(&self, id: &UserId, status: AccountStatus) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        user.status = status;
        Ok(())
    }

    async fn reset_allowance(
        &self,
        tier: SubscriptionTier,
        remaining: u32,
    ) -> Result<u64, RepositoryError> {
        let mut touched = 0;
        for user in self.users.lock().unwrap().values_mut() {
            if user.tier == tier {
                user.remaining_interpretations = remaining;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChats {
    pub sessions: Arc<Mutex<Vec<ChatSession>>>,
    pub messages: Arc<Mutex<Vec<ChatMessage>>>,
    /// Counts every read that reached the store (cache misses).
    pub reads: Arc<Mutex<u32>>,
    /// Holds message and list reads after their snapshot is taken.
    pub read_delay: Arc<Mutex<Option<std::time::Duration>>>,
}

impl InMemoryChats {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn messages_of(&self, session_id: &Uuid) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == *session_id)
            .cloned()
            .collect()
    }

    pub fn reads(&self) -> u32 {
        *self.reads.lock().unwrap()
    }

    pub fn set_read_delay(&self, delay: Option<std::time::Duration>) {
        *self.read_delay.lock().unwrap() = delay;
    }

    fn record_read(&self) {
        *self.reads.lock().unwrap() += 1;
    }

    async fn stall(&self) {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl ChatRepository for InMemoryChats {
    async fn create_session_with_messages(
        &self,
        session: &ChatSession,
        messages: &[ChatMessage],
    ) -> Result<(), RepositoryError> {
        self.sessions.lock().unwrap().push(session.clone());
        self.messages.lock().unwrap().extend_from_slice(messages);
        Ok(())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        self.record_read();
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == *session_id)
            .cloned())
    }

    async fn get_messages(&self, session_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self.messages_of(session_id);
        self.stall().await;
        Ok(messages)
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        self.record_read();
        let mut owned: Vec<ChatSession> = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == *user_id)
            .cloned()
            .collect();
        owned.reverse();
        self.stall().await;
        Ok(owned
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_sessions(&self, user_id: &UserId) -> Result<u64, RepositoryError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == *user_id)
            .count() as u64)
    }

    async fn recent_opening_prompts(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<String>, RepositoryError> {
        let sessions: Vec<Uuid> = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|s| s.user_id == *user_id)
            .take(limit as usize)
            .map(|s| s.id)
            .collect();
        let messages = self.messages.lock().unwrap();
        Ok(sessions
            .iter()
            .filter_map(|id| {
                messages
                    .iter()
                    .find(|m| m.session_id == *id && m.role == MessageRole::User)
                    .map(|m| m.content.clone())
            })
            .collect())
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| s.id != *session_id);
        if sessions.len() == before {
            return Err(RepositoryError::NotFound);
        }
        self.messages
            .lock()
            .unwrap()
            .retain(|m| m.session_id != *session_id);
        Ok(())
    }
}

/// Plain map cache. Invalidation by tag drops every matching entry.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    pages: Arc<Mutex<HashMap<(UserId, PageRequest), SessionPage>>>,
    details: Arc<Mutex<HashMap<Uuid, SessionDetail>>>,
}

impl InMemoryCache {
    pub fn has_detail(&self, session_id: &Uuid) -> bool {
        self.details.lock().unwrap().contains_key(session_id)
    }

    pub fn page_count(&self) -> usize {
        self.pages.lock().unwrap().len()
    }
}

impl SessionCache for InMemoryCache {
    async fn get_page(
        &self,
        user_id: &UserId,
        page: &PageRequest,
    ) -> Result<Option<SessionPage>, CacheError> {
        Ok(self.pages.lock().unwrap().get(&(*user_id, *page)).cloned())
    }

    async fn put_page(
        &self,
        user_id: &UserId,
        page: &PageRequest,
        value: &SessionPage,
    ) -> Result<(), CacheError> {
        self.pages
            .lock()
            .unwrap()
            .insert((*user_id, *page), value.clone());
        Ok(())
    }

    async fn get_detail(&self, session_id: &Uuid) -> Result<Option<SessionDetail>, CacheError> {
        Ok(self.details.lock().unwrap().get(session_id).cloned())
    }

    async fn put_detail(&self, value: &SessionDetail) -> Result<(), CacheError> {
        self.details
            .lock()
            .unwrap()
            .insert(value.session.id, value.clone());
        Ok(())
    }

    async fn invalidate(&self, tag: CacheTag) -> Result<(), CacheError> {
        match tag {
            CacheTag::SessionList(user_id) => {
                self.pages.lock().unwrap().retain(|(owner, _), _| *owner != user_id);
            }
            CacheTag::SessionDetail(session_id) => {
                self.details.lock().unwrap().remove(&session_id);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    InDomain,
    OffTopic,
    Unreachable,
}

/// Oracle with a fixed classifier verdict and a fixed interpret outcome.
#[derive(Clone)]
pub struct ScriptedOracle {
    pub verdict: Verdict,
    pub fail_interpret: bool,
    pub interpret_calls: Arc<Mutex<Vec<InterpretRequest>>>,
}

impl ScriptedOracle {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            fail_interpret: false,
            interpret_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_interpret: true,
            ..Self::new(Verdict::InDomain)
        }
    }

    pub fn calls(&self) -> usize {
        self.interpret_calls.lock().unwrap().len()
    }
}

impl InterpretationOracle for ScriptedOracle {
    async fn classify(&self, _text: &str) -> Result<bool, OracleError> {
        match self.verdict {
            Verdict::InDomain => Ok(true),
            Verdict::OffTopic => Ok(false),
            Verdict::Unreachable => Err(OracleError::Transport("network unreachable".to_string())),
        }
    }

    async fn interpret(&self, request: &InterpretRequest) -> Result<String, OracleError> {
        self.interpret_calls.lock().unwrap().push(request.clone());
        if self.fail_interpret {
            return Err(OracleError::Status {
                status: 503,
                body: "model overloaded".to_string(),
            });
        }
        Ok(format!("Interpretation of: {}", request.new_message_text))
    }
}

pub type TestOrchestrator =
    SessionOrchestrator<InMemoryUsers, InMemoryChats, InMemoryCache, ScriptedOracle>;

/// Everything a scenario needs, sharing state with the orchestrator.
pub struct Harness {
    pub users: InMemoryUsers,
    pub chats: InMemoryChats,
    pub cache: InMemoryCache,
    pub oracle: ScriptedOracle,
    pub push: Arc<PushRegistry>,
    pub orchestrator: TestOrchestrator,
}

impl Harness {
    pub fn new(oracle: ScriptedOracle) -> Self {
        Self::with_mode(oracle, AdmissionMode::Serialized)
    }

    pub fn with_mode(oracle: ScriptedOracle, mode: AdmissionMode) -> Self {
        let users = InMemoryUsers::default();
        let chats = InMemoryChats::default();
        let cache = InMemoryCache::default();
        let push = Arc::new(PushRegistry::default());
        let orchestrator = SessionOrchestrator::new(
            QuotaLedger::new(users.clone(), QuotaPolicy::default(), mode),
            chats.clone(),
            cache.clone(),
            InterpretationDispatcher::new(oracle.clone(), 100),
            Arc::clone(&push),
            ChatSettings::default(),
        );
        Self {
            users,
            chats,
            cache,
            oracle,
            push,
            orchestrator,
        }
    }

    /// Insert a user with the given quota state and return its id.
    pub fn user(
        &self,
        tier: SubscriptionTier,
        remaining: u32,
        last_free: Option<DateTime<Utc>>,
    ) -> UserId {
        let user = User {
            id: UserId::new(),
            name: Some("Dreamer".to_string()),
            birth_date: None,
            external_id: None,
            tier,
            remaining_interpretations: remaining,
            last_free_interpretation_at: last_free,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        };
        let id = user.id;
        self.users.insert(user);
        id
    }
}

//! Session cache port and the advisory wrapper used by the orchestrator.
//!
//! The cache is never the source of truth. `AdvisoryCache` turns every cache
//! failure into a miss (reads) or a no-op (writes, invalidation) after logging
//! it, so an unavailable cache can never fail a request.
//!
//! Fills are guarded by generation tickets. A reader takes a ticket for the
//! tag before reading the store; every invalidation bumps that tag's
//! generation. A fill whose ticket is stale is skipped, and a fill that raced
//! an invalidation is dropped again, so a view read before a mutation is never
//! served after it.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use reverie_types::chat::{PageRequest, SessionDetail, SessionPage};
use reverie_types::error::CacheError;
use reverie_types::user::UserId;
use tracing::{debug, warn};
use uuid::Uuid;

/// Working set to drop after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Every cached list page of this user, whatever the page or page size.
    SessionList(UserId),
    /// The cached detail view of one session.
    SessionDetail(Uuid),
}

/// Read-through cache for session list and detail views.
///
/// Implementations live in reverie-infra (e.g., `MokaSessionCache`).
pub trait SessionCache: Send + Sync {
    fn get_page(
        &self,
        user_id: &UserId,
        page: &PageRequest,
    ) -> impl std::future::Future<Output = Result<Option<SessionPage>, CacheError>> + Send;

    fn put_page(
        &self,
        user_id: &UserId,
        page: &PageRequest,
        value: &SessionPage,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn get_detail(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SessionDetail>, CacheError>> + Send;

    fn put_detail(
        &self,
        value: &SessionDetail,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    fn invalidate(
        &self,
        tag: CacheTag,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;
}

/// Generation counters are striped; tags sharing a stripe only cause extra skipped fills.
const GENERATION_STRIPES: usize = 64;

/// Generation of a tag observed before a store read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket {
    tag: CacheTag,
    generation: u64,
}

/// Wraps a [`SessionCache`] so that its errors are logged and swallowed.
pub struct AdvisoryCache<K: SessionCache> {
    inner: K,
    generations: [AtomicU64; GENERATION_STRIPES],
}

impl<K: SessionCache> AdvisoryCache<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            generations: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    fn stripe(&self, tag: &CacheTag) -> &AtomicU64 {
        let mut hasher = DefaultHasher::new();
        tag.hash(&mut hasher);
        &self.generations[(hasher.finish() as usize) % GENERATION_STRIPES]
    }

    /// Take a ticket for `tag`. Must happen before the store read that feeds the fill.
    pub fn ticket(&self, tag: CacheTag) -> CacheTicket {
        CacheTicket {
            tag,
            generation: self.stripe(&tag).load(Ordering::SeqCst),
        }
    }

    fn is_current(&self, ticket: &CacheTicket) -> bool {
        self.stripe(&ticket.tag).load(Ordering::SeqCst) == ticket.generation
    }

    /// After a fill: if an invalidation ran meanwhile, drop what was just written.
    async fn settle(&self, ticket: &CacheTicket) {
        if !self.is_current(ticket) {
            debug!(tag = ?ticket.tag, "cache fill raced an invalidation, dropping it");
            self.invalidate(ticket.tag).await;
        }
    }

    async fn invalidate(&self, tag: CacheTag) {
        self.stripe(&tag).fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.inner.invalidate(tag).await {
            warn!(?tag, error = %e, "cache invalidation failed");
        }
    }

    pub async fn get_page(&self, user_id: &UserId, page: &PageRequest) -> Option<SessionPage> {
        match self.inner.get_page(user_id, page).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "session list cache read failed");
                None
            }
        }
    }

    pub async fn put_page(
        &self,
        ticket: CacheTicket,
        user_id: &UserId,
        page: &PageRequest,
        value: &SessionPage,
    ) {
        if !self.is_current(&ticket) {
            return;
        }
        if let Err(e) = self.inner.put_page(user_id, page, value).await {
            warn!(user_id = %user_id, error = %e, "session list cache write failed");
        }
        self.settle(&ticket).await;
    }

    pub async fn get_detail(&self, session_id: &Uuid) -> Option<SessionDetail> {
        match self.inner.get_detail(session_id).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "session detail cache read failed");
                None
            }
        }
    }

    pub async fn put_detail(&self, ticket: CacheTicket, value: &SessionDetail) {
        if !self.is_current(&ticket) {
            return;
        }
        if let Err(e) = self.inner.put_detail(value).await {
            warn!(session_id = %value.session.id, error = %e, "session detail cache write failed");
        }
        self.settle(&ticket).await;
    }

    /// Drop the owner's list pages and the session's detail entry.
    pub async fn invalidate_session(&self, owner: &UserId, session_id: &Uuid) {
        for tag in [CacheTag::SessionList(*owner), CacheTag::SessionDetail(*session_id)] {
            self.invalidate(tag).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_types::chat::Pagination;

    struct BrokenCache;

    impl SessionCache for BrokenCache {
        async fn get_page(
            &self,
            _user_id: &UserId,
            _page: &PageRequest,
        ) -> Result<Option<SessionPage>, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn put_page(
            &self,
            _user_id: &UserId,
            _page: &PageRequest,
            _value: &SessionPage,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn get_detail(&self, _session_id: &Uuid) -> Result<Option<SessionDetail>, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn put_detail(&self, _value: &SessionDetail) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn invalidate(&self, _tag: CacheTag) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_broken_cache_reads_as_miss() {
        let cache = AdvisoryCache::new(BrokenCache);
        let user = UserId::new();
        let page = PageRequest { page: 1, page_size: 15 };

        assert!(cache.get_page(&user, &page).await.is_none());
        assert!(cache.get_detail(&Uuid::now_v7()).await.is_none());
    }

    #[tokio::test]
    async fn test_broken_cache_writes_do_not_panic() {
        let cache = AdvisoryCache::new(BrokenCache);
        let user = UserId::new();
        let page = PageRequest { page: 1, page_size: 15 };
        let value = SessionPage {
            items: vec![],
            pagination: Pagination::new(0, page),
        };

        let ticket = cache.ticket(CacheTag::SessionList(user));
        cache.put_page(ticket, &user, &page, &value).await;
        cache.invalidate_session(&user, &Uuid::now_v7()).await;
    }

    /// Single-entry detail store, enough to observe fills.
    #[derive(Default)]
    struct DetailOnly {
        details: std::sync::Mutex<std::collections::HashMap<Uuid, SessionDetail>>,
    }

    impl SessionCache for DetailOnly {
        async fn get_page(
            &self,
            _user_id: &UserId,
            _page: &PageRequest,
        ) -> Result<Option<SessionPage>, CacheError> {
            Ok(None)
        }

        async fn put_page(
            &self,
            _user_id: &UserId,
            _page: &PageRequest,
            _value: &SessionPage,
        ) -> Result<(), CacheError> {
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
            if let CacheTag::SessionDetail(id) = tag {
                self.details.lock().unwrap().remove(&id);
            }
            Ok(())
        }
    }

    fn detail(owner: UserId) -> SessionDetail {
        SessionDetail {
            session: reverie_types::chat::ChatSession {
                id: Uuid::now_v7(),
                user_id: owner,
                title: "Falling".to_string(),
                created_at: chrono::Utc::now(),
            },
            messages: vec![],
        }
    }

    #[tokio::test]
    async fn test_fill_with_current_ticket_is_cached() {
        let cache = AdvisoryCache::new(DetailOnly::default());
        let value = detail(UserId::new());

        let ticket = cache.ticket(CacheTag::SessionDetail(value.session.id));
        cache.put_detail(ticket, &value).await;

        assert_eq!(cache.get_detail(&value.session.id).await, Some(value));
    }

    #[tokio::test]
    async fn test_fill_after_invalidation_is_skipped() {
        let cache = AdvisoryCache::new(DetailOnly::default());
        let value = detail(UserId::new());
        let id = value.session.id;

        // Read started, then the session was deleted before the fill.
        let ticket = cache.ticket(CacheTag::SessionDetail(id));
        cache.invalidate_session(&value.session.user_id, &id).await;
        cache.put_detail(ticket, &value).await;

        assert!(cache.get_detail(&id).await.is_none());

        // A fresh read after the mutation fills normally.
        let ticket = cache.ticket(CacheTag::SessionDetail(id));
        cache.put_detail(ticket, &value).await;
        assert!(cache.get_detail(&id).await.is_some());
    }
}

//! In-process session view cache backed by moka.
//!
//! List pages are keyed by `(user, page request)` and expire after
//! `cache.list_ttl_secs`; detail views are keyed by session id and expire after
//! `cache.detail_ttl_secs`. Both caches are bounded by `cache.max_capacity`.
//! Dropping every page of one user uses moka's invalidation predicates, so no
//! side index has to track which page requests were cached.

use std::time::Duration;

use moka::future::Cache;
use reverie_core::cache::{CacheTag, SessionCache};
use reverie_types::chat::{PageRequest, SessionDetail, SessionPage};
use reverie_types::config::CacheConfig;
use reverie_types::error::CacheError;
use reverie_types::user::UserId;
use uuid::Uuid;

#[derive(Clone)]
pub struct MokaSessionCache {
    pages: Cache<(UserId, PageRequest), SessionPage>,
    details: Cache<Uuid, SessionDetail>,
}

impl MokaSessionCache {
    pub fn new(max_capacity: u64, list_ttl: Duration, detail_ttl: Duration) -> Self {
        Self {
            pages: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(list_ttl)
                .support_invalidation_closures()
                .build(),
            details: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(detail_ttl)
                .build(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.max_capacity,
            Duration::from_secs(config.list_ttl_secs),
            Duration::from_secs(config.detail_ttl_secs),
        )
    }
}

impl SessionCache for MokaSessionCache {
    async fn get_page(
        &self,
        user_id: &UserId,
        page: &PageRequest,
    ) -> Result<Option<SessionPage>, CacheError> {
        Ok(self.pages.get(&(*user_id, *page)).await)
    }

    async fn put_page(
        &self,
        user_id: &UserId,
        page: &PageRequest,
        value: &SessionPage,
    ) -> Result<(), CacheError> {
        self.pages.insert((*user_id, *page), value.clone()).await;
        Ok(())
    }

    async fn get_detail(&self, session_id: &Uuid) -> Result<Option<SessionDetail>, CacheError> {
        Ok(self.details.get(session_id).await)
    }

    async fn put_detail(&self, value: &SessionDetail) -> Result<(), CacheError> {
        self.details.insert(value.session.id, value.clone()).await;
        Ok(())
    }

    async fn invalidate(&self, tag: CacheTag) -> Result<(), CacheError> {
        match tag {
            CacheTag::SessionList(user_id) => {
                self.pages
                    .invalidate_entries_if(move |(owner, _), _| *owner == user_id)
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            }
            CacheTag::SessionDetail(session_id) => {
                self.details.invalidate(&session_id).await;
            }
        }
        Ok(())
    }
}

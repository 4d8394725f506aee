//! Bearer token issuance and lookup.
//!
//! Tokens are shown to the user once at issuance. Only their SHA-256 hash is
//! stored in `api_tokens`.

use chrono::Utc;
use reverie_types::error::RepositoryError;
use reverie_types::user::UserId;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use super::format_datetime;
use super::pool::DatabasePool;

const TOKEN_PREFIX: &str = "rvr_";

#[derive(Clone)]
pub struct SqliteTokenStore {
    pool: DatabasePool,
}

/// Compute SHA-256 hash of a token (lowercase hex).
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}

fn generate_token() -> String {
    format!(
        "{TOKEN_PREFIX}{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

impl SqliteTokenStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Issue a new token for `user_id` and return its plaintext.
    pub async fn issue(&self, user_id: &UserId) -> Result<String, RepositoryError> {
        let token = generate_token();
        sqlx::query(
            "INSERT INTO api_tokens (id, user_id, token_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(user_id.to_string())
        .bind(hash_token(&token))
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(token)
    }

    /// Resolve a presented token to its user, touching `last_used_at`.
    pub async fn resolve(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        let token_hash = hash_token(token);
        let row = sqlx::query("SELECT id, user_id FROM api_tokens WHERE token_hash = ?")
            .bind(&token_hash)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = row
            .try_get("id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let user_id = user_id
            .parse::<UserId>()
            .map_err(|e| RepositoryError::Query(format!("invalid user_id: {e}")))?;

        // Best effort, never fails the lookup.
        if let Err(e) = sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(&id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::debug!(error = %e, "failed to touch token last_used_at");
        }

        Ok(Some(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::database_url;
    use crate::sqlite::user::SqliteUserRepository;
    use reverie_core::repository::user::UserRepository;
    use reverie_types::user::{AccountStatus, SubscriptionTier, User};

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(dir.path());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_token("rvr_abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("rvr_abc"));
        assert_ne!(hash, hash_token("rvr_abd"));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert!(a.starts_with(TOKEN_PREFIX));
        assert_eq!(a.len(), TOKEN_PREFIX.len() + 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_issue_and_resolve() {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let user = User {
            id: UserId::new(),
            name: None,
            birth_date: None,
            external_id: None,
            tier: SubscriptionTier::Free,
            remaining_interpretations: 3,
            last_free_interpretation_at: None,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        };
        users.create_user(&user).await.unwrap();

        let tokens = SqliteTokenStore::new(pool);
        let token = tokens.issue(&user.id).await.unwrap();

        assert_eq!(tokens.resolve(&token).await.unwrap(), Some(user.id));
        assert_eq!(tokens.resolve("rvr_bogus").await.unwrap(), None);
    }
}

//! SQLite user repository implementation.

use chrono::{DateTime, NaiveDate, Utc};
use reverie_core::repository::user::UserRepository;
use reverie_types::error::RepositoryError;
use reverie_types::user::{AccountStatus, SubscriptionTier, User, UserId};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `UserRepository`.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain User.
struct UserRow {
    id: String,
    name: Option<String>,
    birth_date: Option<String>,
    external_id: Option<String>,
    tier: String,
    remaining_interpretations: i64,
    last_free_interpretation_at: Option<String>,
    status: String,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            birth_date: row.try_get("birth_date")?,
            external_id: row.try_get("external_id")?,
            tier: row.try_get("tier")?,
            remaining_interpretations: row.try_get("remaining_interpretations")?,
            last_free_interpretation_at: row.try_get("last_free_interpretation_at")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?;
        let birth_date = self
            .birth_date
            .as_deref()
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| RepositoryError::Query(format!("invalid birth_date: {e}")))
            })
            .transpose()?;
        let tier: SubscriptionTier = self.tier.parse().map_err(RepositoryError::Query)?;
        let status: AccountStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let last_free_interpretation_at = self
            .last_free_interpretation_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(User {
            id: UserId(id),
            name: self.name,
            birth_date,
            external_id: self.external_id,
            tier,
            remaining_interpretations: u32::try_from(self.remaining_interpretations).unwrap_or(0),
            last_free_interpretation_at,
            status,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn map_row(row: Option<sqlx::sqlite::SqliteRow>) -> Result<Option<User>, RepositoryError> {
    match row {
        Some(row) => {
            let user_row =
                UserRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            Ok(Some(user_row.into_user()?))
        }
        None => Ok(None),
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: &User) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, birth_date, external_id, tier, remaining_interpretations, last_free_interpretation_at, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(user.birth_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&user.external_id)
        .bind(user.tier.to_string())
        .bind(i64::from(user.remaining_interpretations))
        .bind(user.last_free_interpretation_at.as_ref().map(format_datetime))
        .bind(user.status.to_string())
        .bind(format_datetime(&user.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(user.clone()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(user.external_id.clone().unwrap_or_default()),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        map_row(row)
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        map_row(row)
    }

    async fn charge_quota(
        &self,
        id: &UserId,
        decrement: bool,
        stamp_free_at: Option<DateTime<Utc>>,
    ) -> Result<u32, RepositoryError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE users SET
                remaining_interpretations = CASE WHEN ? THEN MAX(remaining_interpretations - 1, 0)
                                                 ELSE remaining_interpretations END,
                last_free_interpretation_at = COALESCE(?, last_free_interpretation_at)
             WHERE id = ?
             RETURNING remaining_interpretations",
        )
        .bind(decrement)
        .bind(stamp_free_at.as_ref().map(format_datetime))
        .bind(id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let (remaining,) = row.ok_or(RepositoryError::NotFound)?;
        Ok(u32::try_from(remaining).unwrap_or(0))
    }

    async fn set_tier(
        &self,
        id: &UserId,
        tier: SubscriptionTier,
        remaining: u32,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET tier = ?, remaining_interpretations = ? WHERE id = ?")
                .bind(tier.to_string())
                .bind(i64::from(remaining))
                .bind(id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_status(&self, id: &UserId, status: AccountStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn reset_allowance(
        &self,
        tier: SubscriptionTier,
        remaining: u32,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE users SET remaining_interpretations = ? WHERE tier = ?")
            .bind(i64::from(remaining))
            .bind(tier.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

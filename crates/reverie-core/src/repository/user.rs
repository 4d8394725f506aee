//! UserRepository trait definition.

use chrono::{DateTime, Utc};
use reverie_types::error::RepositoryError;
use reverie_types::user::{AccountStatus, SubscriptionTier, User, UserId};

/// Repository trait for user persistence, including the quota fields.
///
/// Implementations live in reverie-infra (e.g., `SqliteUserRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    fn create_user(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    fn get_user(
        &self,
        id: &UserId,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Look up a user by their relay-side identifier.
    fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Apply the cost of an admitted interpretation to the stored row.
    ///
    /// `decrement` takes one unit from the current stored allowance, saturating
    /// at zero; `stamp_free_at`, when set, replaces the last free-interpretation
    /// time. Returns the stored remaining allowance after the charge, or
    /// `RepositoryError::NotFound` if the user does not exist.
    fn charge_quota(
        &self,
        id: &UserId,
        decrement: bool,
        stamp_free_at: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Change the subscription tier and set the remaining allowance.
    fn set_tier(
        &self,
        id: &UserId,
        tier: SubscriptionTier,
        remaining: u32,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn set_status(
        &self,
        id: &UserId,
        status: AccountStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Set `remaining` for every user of `tier`. Returns the number of rows touched.
    fn reset_allowance(
        &self,
        tier: SubscriptionTier,
        remaining: u32,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

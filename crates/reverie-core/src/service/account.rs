//! Account service.
//!
//! Registration, profile lookups, the subscription flip to premium and the
//! daily premium allowance reset. Relay-side users are notified through the
//! push registry when they authenticate or are upgraded.

use std::sync::Arc;

use chrono::Utc;
use reverie_types::error::AccountError;
use reverie_types::event::{PushEvent, RecipientId, RelayUserPayload};
use reverie_types::user::{AccountStatus, NewUser, QuotaView, SubscriptionTier, User, UserId};
use tracing::{debug, info};

use crate::push::PushRegistry;
use crate::quota::QuotaPolicy;
use crate::repository::user::UserRepository;

/// Service owning the user lifecycle outside of quota admission.
///
/// Generic over the repository trait so reverie-core never depends on
/// reverie-infra.
pub struct AccountService<U: UserRepository> {
    users: U,
    policy: QuotaPolicy,
    push: Arc<PushRegistry>,
}

impl<U: UserRepository> AccountService<U> {
    pub fn new(users: U, policy: QuotaPolicy, push: Arc<PushRegistry>) -> Self {
        Self {
            users,
            policy,
            push,
        }
    }

    /// Create a user with the allowance of its tier.
    pub async fn register_user(&self, request: NewUser) -> Result<User, AccountError> {
        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let external_id = request
            .external_id
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        if let Some(ext) = &external_id {
            if self.users.get_by_external_id(ext).await?.is_some() {
                return Err(AccountError::ExternalIdConflict(ext.clone()));
            }
        }

        let user = User {
            id: UserId::new(),
            name,
            birth_date: request.birth_date,
            external_id,
            tier: request.tier,
            remaining_interpretations: self.policy.allowance(request.tier),
            last_free_interpretation_at: None,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        };

        let user = self.users.create_user(&user).await?;
        info!(user_id = %user.id, tier = %user.tier, "user registered");
        Ok(user)
    }

    pub async fn get_user(&self, id: &UserId) -> Result<User, AccountError> {
        self.users.get_user(id).await?.ok_or(AccountError::NotFound)
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<User, AccountError> {
        self.users
            .get_by_external_id(external_id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    /// Quota state of `user` as of now.
    pub fn quota_view(&self, user: &User) -> QuotaView {
        self.policy.view(user, Utc::now())
    }

    /// Flip the user to premium with a full daily allowance.
    ///
    /// Relay-side users are announced to the relay with `user_upgraded_to_premium`.
    pub async fn upgrade_to_premium(&self, id: &UserId) -> Result<User, AccountError> {
        let allowance = self.policy.allowance(SubscriptionTier::Premium);
        self.users
            .set_tier(id, SubscriptionTier::Premium, allowance)
            .await?;
        let user = self.get_user(id).await?;
        info!(user_id = %id, remaining = allowance, "user upgraded to premium");

        if let Some(external_user_id) = &user.external_id {
            let delivered = self.push.send_to(
                RecipientId::Relay,
                PushEvent::UserUpgradedToPremium(RelayUserPayload {
                    external_user_id: external_user_id.clone(),
                    name: user.display_name().to_string(),
                }),
            );
            debug!(user_id = %id, delivered, "relay notified of upgrade");
        }
        Ok(user)
    }

    pub async fn set_status(&self, id: &UserId, status: AccountStatus) -> Result<User, AccountError> {
        self.users.set_status(id, status).await?;
        info!(user_id = %id, %status, "account status changed");
        self.get_user(id).await
    }

    /// Restore the daily allowance of every premium user. Returns the number reset.
    pub async fn reset_premium_allowances(&self) -> Result<u64, AccountError> {
        let allowance = self.policy.allowance(SubscriptionTier::Premium);
        let count = self
            .users
            .reset_allowance(SubscriptionTier::Premium, allowance)
            .await?;
        info!(count, allowance, "premium allowances reset");
        Ok(count)
    }

    /// Tell the relay that one of its users authenticated.
    ///
    /// Returns whether the event reached a connected relay.
    pub async fn notify_relay_user_authed(
        &self,
        external_user_id: &str,
        name: Option<String>,
    ) -> Result<bool, AccountError> {
        let user = self.find_by_external_id(external_user_id).await?;
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| user.display_name().to_string());
        let delivered = self.push.send_to(
            RecipientId::Relay,
            PushEvent::UserAuthed(RelayUserPayload {
                external_user_id: external_user_id.to_string(),
                name,
            }),
        );
        debug!(user_id = %user.id, delivered, "relay notified of authentication");
        Ok(delivered)
    }
}

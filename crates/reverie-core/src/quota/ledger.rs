//! Quota ledger: admits interpretations and applies their cost.
//!
//! Admission is a read of the user's quota fields, a policy decision on that
//! snapshot, then a relative charge against the stored row. Because the charge
//! is relative, a reset or upgrade that lands between the read and the write
//! is never overwritten. In `AdmissionMode::Serialized` both steps for one user
//! run under a per-user async mutex, so two concurrent requests cannot be
//! admitted on the same unit. In `AdmissionMode::Relaxed` there is no lock and
//! concurrent admissions may both pass the check; this is single-process only
//! either way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reverie_types::config::AdmissionMode;
use reverie_types::error::{ChatError, RepositoryError};
use reverie_types::user::{User, UserId};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::policy::QuotaPolicy;
use crate::repository::user::UserRepository;

pub struct QuotaLedger<U: UserRepository> {
    users: U,
    policy: QuotaPolicy,
    mode: AdmissionMode,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl<U: UserRepository> QuotaLedger<U> {
    pub fn new(users: U, policy: QuotaPolicy, mode: AdmissionMode) -> Self {
        Self {
            users,
            policy,
            mode,
            locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    /// Admit one interpretation for `user_id` now.
    ///
    /// Returns the user with the charged quota fields on success.
    pub async fn admit(&self, user_id: &UserId) -> Result<User, ChatError> {
        self.admit_at(user_id, Utc::now()).await
    }

    /// Admit one interpretation for `user_id` as of `now`.
    ///
    /// Errors: `NotFound` if the user does not exist, `Forbidden` if the account
    /// is banned, `AdmissionDenied` if the quota does not allow it.
    pub async fn admit_at(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<User, ChatError> {
        match self.mode {
            AdmissionMode::Relaxed => self.charge(user_id, now).await,
            AdmissionMode::Serialized => {
                let lock = self.locks.entry(*user_id).or_default().clone();
                let guard = lock.clone().lock_owned().await;
                let result = self.charge(user_id, now).await;
                drop(guard);
                drop(lock);
                self.locks
                    .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
                result
            }
        }
    }

    async fn charge(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<User, ChatError> {
        let mut user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(ChatError::NotFound("user"))?;

        if user.is_banned() {
            info!(user_id = %user_id, "admission refused for banned account");
            return Err(ChatError::Forbidden);
        }

        let charge = match self.policy.evaluate(&user, now) {
            Ok(charge) => charge,
            Err(denial) => {
                info!(user_id = %user_id, tier = %user.tier, ?denial, "interpretation not admitted");
                return Err(ChatError::denied(denial));
            }
        };

        let remaining = self
            .users
            .charge_quota(user_id, charge.decrement, charge.stamp_free_at)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ChatError::NotFound("user"),
                other => ChatError::Storage(other.to_string()),
            })?;

        debug!(user_id = %user_id, remaining, "interpretation admitted");

        user.remaining_interpretations = remaining;
        if charge.stamp_free_at.is_some() {
            user.last_free_interpretation_at = charge.stamp_free_at;
        }
        Ok(user)
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}
